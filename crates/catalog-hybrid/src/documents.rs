//! Full-document access for snippet line numbers.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use catalog_core::traits::DocumentSource;

/// Reads documents from per-dataset root directories on disk.
#[derive(Debug, Clone, Default)]
pub struct FsDocumentSource {
    roots: BTreeMap<String, PathBuf>,
}

impl FsDocumentSource {
    pub fn new(roots: BTreeMap<String, PathBuf>) -> Self {
        Self { roots }
    }

    fn resolve(&self, dataset_name: &str, path: &str) -> Option<PathBuf> {
        let root = self.roots.get(dataset_name)?;
        let relative = Path::new(path);
        // Only plain relative paths below the dataset root.
        if !relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            return None;
        }
        Some(root.join(relative))
    }
}

impl DocumentSource for FsDocumentSource {
    fn document_text(&self, dataset_name: &str, path: &str) -> Option<String> {
        let full = self.resolve(dataset_name, path)?;
        match std::fs::read_to_string(&full) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(path = %full.display(), error = %e, "document unavailable for snippet");
                None
            }
        }
    }
}
