//! Chunking, memory-aware batched embedding, and the Qdrant-backed
//! vector store: turns parsed C source into searchable vectors,
//! project-isolated by collection name.

pub mod chunker;
pub mod embedder;
pub mod memory;
pub mod ollama_embedder;
pub mod qdrant_store;

pub use chunker::*;
pub use embedder::Embedder;
pub use memory::{MemoryManager, MemoryStats};
pub use ollama_embedder::OllamaEmbeddingEngine;
pub use qdrant_store::QdrantVectorStore;
