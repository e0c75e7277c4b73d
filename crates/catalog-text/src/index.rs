use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::TermQuery;
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Index, IndexReader, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, warn};

use catalog_core::heading::extract_heading_body;
use catalog_core::traits::ChunkTextLookup;
use catalog_core::types::ChunkRecord;

use crate::tantivy_utils::{build_schema, register_tokenizer, ChunkFields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Tantivy index of chunks with separate heading and body columns.
pub struct ChunkIndex {
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	pub(crate) fields: ChunkFields,
}

impl ChunkIndex {
	/// Open an existing index or create an empty one at `index_dir`.
	pub fn open_or_create(index_dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(index_dir).with_context(|| format!("creating {}", index_dir.display()))?;
		let directory = MmapDirectory::open(index_dir)?;
		let index = if Index::exists(&directory)? {
			Index::open(directory)?
		} else {
			Index::create_in_dir(index_dir, build_schema())?
		};
		Self::from_index(index)
	}

	/// Wipe `index_dir` and start from an empty index.
	pub fn recreate(index_dir: &Path) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		Self::from_index(Index::create_in_dir(index_dir, build_schema())?)
	}

	pub fn in_memory() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let fields = ChunkFields::from_schema(&index.schema())?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { index, reader, fields })
	}

	/// Insert or replace chunks keyed by `node_id`. Returns the number written.
	pub fn index_chunks(&self, chunks: &[ChunkRecord]) -> Result<usize> {
		let mut index_writer = self.index.writer(WRITER_HEAP_BYTES)?;
		let mut count = 0;
		for chunk in chunks {
			if chunk.node_id.is_empty() || chunk.dataset_name().is_empty() {
				warn!(
					node_id = %chunk.node_id,
					source_doc_id = %chunk.source_doc_id,
					"skipping chunk without dataset-qualified identity"
				);
				continue;
			}
			let (heading, body) = extract_heading_body(&chunk.text);
			let mut doc = TantivyDocument::default();
			doc.add_text(self.fields.node_id, &chunk.node_id);
			doc.add_text(self.fields.source_doc_id, &chunk.source_doc_id);
			doc.add_text(self.fields.dataset, chunk.dataset_name());
			doc.add_text(self.fields.heading, &heading);
			doc.add_text(self.fields.body, &body);
			doc.add_text(self.fields.raw_text, &chunk.text);
			if let Some(seq) = chunk.chunk_seq { doc.add_i64(self.fields.chunk_seq, seq); }
			if let Some(pos) = chunk.chunk_pos { doc.add_i64(self.fields.chunk_pos, pos); }
			if let Some(hash) = &chunk.content_hash { doc.add_text(self.fields.content_hash, hash); }
			index_writer.delete_term(Term::from_field_text(self.fields.node_id, &chunk.node_id));
			index_writer.add_document(doc)?;
			count += 1;
		}
		index_writer.commit()?;
		self.reader.reload()?;
		debug!(count, "indexed chunks");
		Ok(count)
	}

	pub fn num_chunks(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	pub(crate) fn record_from_doc(&self, doc: &TantivyDocument) -> ChunkRecord {
		let text_of = |field| doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string);
		let int_of = |field| doc.get_first(field).and_then(|v| v.as_i64());
		ChunkRecord {
			node_id: text_of(self.fields.node_id).unwrap_or_default(),
			source_doc_id: text_of(self.fields.source_doc_id).unwrap_or_default(),
			text: text_of(self.fields.raw_text).unwrap_or_default(),
			chunk_seq: int_of(self.fields.chunk_seq),
			chunk_pos: int_of(self.fields.chunk_pos),
			content_hash: text_of(self.fields.content_hash),
		}
	}
}

impl ChunkTextLookup for ChunkIndex {
	fn lookup_chunks(&self, node_ids: &[String]) -> Result<HashMap<String, ChunkRecord>> {
		let searcher = self.reader.searcher();
		let mut found = HashMap::with_capacity(node_ids.len());
		for node_id in node_ids {
			let term = Term::from_field_text(self.fields.node_id, node_id);
			let query = TermQuery::new(term, IndexRecordOption::Basic);
			let top = searcher.search(&query, &TopDocs::with_limit(1))?;
			if let Some((_, addr)) = top.first() {
				let doc: TantivyDocument = searcher.doc(*addr)?;
				found.insert(node_id.clone(), self.record_from_doc(&doc));
			}
		}
		Ok(found)
	}
}
