//! Hybrid retrieval: lexical and vector retrievers, weighted RRF fusion, the
//! search service and the golden-query evaluation harness.

pub mod documents;
pub mod eval;
pub mod fusion;
pub mod retrievers;
pub mod service;

pub use documents::FsDocumentSource;
pub use fusion::{fuse, RankedList, RrfConfig};
pub use retrievers::{FtsRetriever, VectorRetriever};
pub use service::SearchService;
