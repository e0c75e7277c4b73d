use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// One row per chunk vector, tagged with the embedding identity that made it.
/// Chunk text lives in the text index, not here.
pub fn build_chunk_vector_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("node_id", DataType::Utf8, false),
		Field::new("source_doc_id", DataType::Utf8, false),
		Field::new("dataset", DataType::Utf8, false),
		Field::new("embedding_backend", DataType::Utf8, false),
		Field::new("embedding_model_name", DataType::Utf8, false),
		Field::new("embedding_profile", DataType::Utf8, false),
		Field::new("chunk_seq", DataType::Int64, true),
		Field::new("chunk_pos", DataType::Int64, true),
		Field::new("content_hash", DataType::Utf8, true),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
