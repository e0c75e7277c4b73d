//! LanceDB storage for chunk vectors tagged with their embedding identity.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::LanceVectorStore;
pub use writer::VectorWriter;
