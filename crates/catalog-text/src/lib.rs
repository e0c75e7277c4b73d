//! Tantivy-backed chunk index: heading/body columns, intent-weighted lexical
//! search, dataset filtering and chunk lookup by `node_id`.

pub mod index;
pub mod search;
pub mod tantivy_utils;

pub use index::ChunkIndex;
