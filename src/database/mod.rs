pub mod memory_index;
pub mod qdrant_config;
pub mod qdrant_index;
pub mod vector_db;

pub use memory_index::MemoryVectorStore;
pub use qdrant_index::QdrantVectorStore;
pub use vector_db::{IndexHandle, IndexedChunk, ScoredChunk, VectorStore};
