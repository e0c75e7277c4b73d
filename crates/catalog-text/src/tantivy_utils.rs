use anyhow::Result;
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "text_with_stopwords";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("node_id", STRING | STORED);
	schema_builder.add_text_field("source_doc_id", STRING | STORED);
	schema_builder.add_text_field("dataset", STRING);
	let text_field_indexing = TextFieldIndexing::default()
		.set_tokenizer(TOKENIZER_NAME)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let heading_options = TextOptions::default().set_indexing_options(text_field_indexing.clone());
	schema_builder.add_text_field("heading", heading_options);
	let body_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field("body", body_options);
	schema_builder.add_text_field("raw_text", STORED);
	schema_builder.add_i64_field("chunk_seq", STORED);
	schema_builder.add_i64_field("chunk_pos", STORED);
	schema_builder.add_text_field("content_hash", STORED);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}

/// Resolved schema fields for the chunk index.
#[derive(Debug, Clone, Copy)]
pub struct ChunkFields {
	pub node_id: Field,
	pub source_doc_id: Field,
	pub dataset: Field,
	pub heading: Field,
	pub body: Field,
	pub raw_text: Field,
	pub chunk_seq: Field,
	pub chunk_pos: Field,
	pub content_hash: Field,
}

impl ChunkFields {
	pub fn from_schema(schema: &Schema) -> Result<Self> {
		Ok(Self {
			node_id: schema.get_field("node_id")?,
			source_doc_id: schema.get_field("source_doc_id")?,
			dataset: schema.get_field("dataset")?,
			heading: schema.get_field("heading")?,
			body: schema.get_field("body")?,
			raw_text: schema.get_field("raw_text")?,
			chunk_seq: schema.get_field("chunk_seq")?,
			chunk_pos: schema.get_field("chunk_pos")?,
			content_hash: schema.get_field("content_hash")?,
		})
	}
}
