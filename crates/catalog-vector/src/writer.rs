use anyhow::{ensure, Result};
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;
use tracing::{debug, info};

use catalog_core::identity::EmbeddingIdentity;
use catalog_core::traits::Embedder;
use catalog_core::types::ChunkRecord;

use crate::schema::build_chunk_vector_schema;
use crate::table::ensure_table;

pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Writes chunk vectors for one embedding identity, upserting on `node_id`.
pub struct VectorWriter {
	conn: Connection,
	table_name: String,
	dim: usize,
	identity: EmbeddingIdentity,
}

impl VectorWriter {
	pub fn new(conn: Connection, table_name: &str, dim: usize, identity: EmbeddingIdentity) -> Self {
		Self { conn, table_name: table_name.to_string(), dim, identity }
	}

	/// Embed and upsert chunks in batches. Returns the number of rows written.
	pub async fn index_chunks(
		&self,
		embedder: &dyn Embedder,
		chunks: &[ChunkRecord],
		batch_size: usize,
	) -> Result<usize> {
		if chunks.is_empty() {
			return Ok(0);
		}
		ensure!(embedder.dim() == self.dim, "embedder dim {} does not match table dim {}", embedder.dim(), self.dim);
		info!(chunks = chunks.len(), table = %self.table_name, identity = %self.identity, "indexing vectors");
		let pb = ProgressBar::new(chunks.len() as u64);
		pb.set_style(
			ProgressStyle::default_bar()
				.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
				.progress_chars("#>-"),
		);
		let mut written = 0usize;
		for batch in chunks.chunks(batch_size.max(1)) {
			let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
			let vectors = embedder.embed_batch(&texts)?;
			written += self.upsert(batch, &vectors).await?;
			pb.set_position(written as u64);
		}
		pb.finish_and_clear();
		Ok(written)
	}

	/// Insert or replace rows for `chunks` with precomputed `vectors`.
	pub async fn upsert(&self, chunks: &[ChunkRecord], vectors: &[Vec<f32>]) -> Result<usize> {
		if chunks.is_empty() {
			return Ok(0);
		}
		ensure!(
			chunks.len() == vectors.len(),
			"chunks ({}) and vectors ({}) length must match",
			chunks.len(),
			vectors.len()
		);
		let schema = build_chunk_vector_schema(i32::try_from(self.dim)?);
		ensure_table(&self.conn, &self.table_name, schema.clone()).await?;
		let record_batch = self.to_record_batch(chunks, vectors)?;
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		let table = self.conn.open_table(&self.table_name).execute().await?;
		let mut mi = table.merge_insert(&["node_id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		mi.execute(reader).await?;
		debug!(rows = chunks.len(), "upserted vectors");
		Ok(chunks.len())
	}

	fn to_record_batch(&self, chunks: &[ChunkRecord], vectors: &[Vec<f32>]) -> Result<RecordBatch> {
		let schema = build_chunk_vector_schema(i32::try_from(self.dim)?);
		let n = chunks.len();
		let mut node_ids = Vec::with_capacity(n);
		let mut source_doc_ids = Vec::with_capacity(n);
		let mut datasets = Vec::with_capacity(n);
		let mut chunk_seqs = Vec::with_capacity(n);
		let mut chunk_poss = Vec::with_capacity(n);
		let mut hashes = Vec::with_capacity(n);
		let mut list: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(n);
		for (chunk, vector) in chunks.iter().zip(vectors) {
			ensure!(
				vector.len() == self.dim,
				"vector for {} has dim {}, expected {}",
				chunk.node_id,
				vector.len(),
				self.dim
			);
			node_ids.push(chunk.node_id.clone());
			source_doc_ids.push(chunk.source_doc_id.clone());
			datasets.push(chunk.dataset_name().to_string());
			chunk_seqs.push(chunk.chunk_seq);
			chunk_poss.push(chunk.chunk_pos);
			hashes.push(chunk.content_hash.clone());
			list.push(Some(vector.iter().map(|&x| Some(x)).collect()));
		}
		let dim = i32::try_from(self.dim)?;
		let vectors = FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(list, dim);
		let record_batch = RecordBatch::try_new(
			schema,
			vec![
				Arc::new(StringArray::from(node_ids)),
				Arc::new(StringArray::from(source_doc_ids)),
				Arc::new(StringArray::from(datasets)),
				Arc::new(StringArray::from(vec![self.identity.backend.clone(); n])),
				Arc::new(StringArray::from(vec![self.identity.model_name.clone(); n])),
				Arc::new(StringArray::from(vec![self.identity.profile(); n])),
				Arc::new(Int64Array::from(chunk_seqs)),
				Arc::new(Int64Array::from(chunk_poss)),
				Arc::new(StringArray::from(hashes)),
				Arc::new(vectors),
			],
		)?;
		Ok(record_batch)
	}
}
