use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::warn;

use catalog_core::types::ChunkRecord;
use catalog_embed::get_default_embedder;
use catalog_text::ChunkIndex;
use catalog_vector::table::open_db;
use catalog_vector::VectorWriter;

use crate::base_dir;
use crate::context::load_config;

#[derive(Args)]
pub struct IndexArgs {
    /// JSON-lines file of `{node_id, source_doc_id, text, chunk_seq?, chunk_pos?, content_hash?}`
    pub chunks_file: PathBuf,

    /// Drop existing indexes before writing
    #[arg(long)]
    pub recreate: bool,

    /// Only write the text index
    #[arg(long)]
    pub skip_vectors: bool,

    /// Embedding batch size (defaults to `embedding.batch_size`)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

/// Parse chunk records, skipping blank and malformed lines with a warning.
pub fn read_chunks(path: &Path) -> Result<(Vec<ChunkRecord>, usize)> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut chunks = Vec::new();
    let mut skipped = 0;
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChunkRecord>(line) {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed chunk record");
                skipped += 1;
            }
        }
    }
    Ok((chunks, skipped))
}

pub async fn run(args: IndexArgs) -> Result<i32> {
    let config = load_config()?;
    let data = config.data()?;
    let embedding = config.embedding()?;
    let base = base_dir();

    let (chunks, skipped) = read_chunks(&args.chunks_file)?;
    println!("Catalog Indexer\n===============");
    println!("Chunks file: {}", args.chunks_file.display());
    if skipped > 0 {
        println!("⚠️  Skipped {skipped} malformed records");
    }

    let index_path = data.tantivy_index_path(&base);
    let index = if args.recreate {
        ChunkIndex::recreate(&index_path)?
    } else {
        ChunkIndex::open_or_create(&index_path)?
    };
    let text_count = index.index_chunks(&chunks)?;
    println!("📊 Indexed {text_count} chunks into Tantivy at {}", index_path.display());

    if args.skip_vectors {
        println!("⚠️  Skipping vector indexing (--skip-vectors flag)");
    } else if !chunks.is_empty() {
        let lancedb_path = data.lancedb_path(&base);
        if args.recreate && lancedb_path.exists() {
            std::fs::remove_dir_all(&lancedb_path)?;
        }
        std::fs::create_dir_all(&lancedb_path)?;
        let (identity, embedder) = get_default_embedder(&embedding)?;
        let conn = open_db(&lancedb_path.to_string_lossy()).await?;
        let writer = VectorWriter::new(conn, &data.vector_table, embedder.dim(), identity.clone());
        let batch_size = args.batch_size.unwrap_or(embedding.batch_size);
        let written = writer.index_chunks(embedder.as_ref(), &chunks, batch_size).await?;
        println!("📊 Wrote {written} vectors ({identity}) to {}", lancedb_path.display());
    }

    println!("\n✅ Indexing completed successfully!");
    Ok(0)
}
