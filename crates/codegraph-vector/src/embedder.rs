//! Batched chunk embedding with memory-pressure backoff.
//!
//! `Embedder` is generic over the `EmbeddingEngine`/`VectorStore`
//! trait objects rather than taking concrete Qdrant/model types, so
//! the batching and backoff logic can be exercised with fakes instead
//! of a live model and database.

use std::sync::Arc;

use codegraph_core::{CodeChunk, EmbeddingEngine, Result, VectorStore};
use tracing::{debug, info};

use crate::memory::MemoryManager;

/// Batch size never drops below this floor, no matter how much memory
/// pressure is reported.
const MIN_BATCH_SIZE: usize = 5;

pub struct Embedder {
    engine: Arc<dyn EmbeddingEngine>,
    store: Arc<dyn VectorStore>,
    memory: MemoryManager,
    initial_batch_size: usize,
}

impl Embedder {
    pub fn new(
        engine: Arc<dyn EmbeddingEngine>,
        store: Arc<dyn VectorStore>,
        max_memory_percent: f32,
        batch_size: usize,
    ) -> Self {
        Self {
            engine,
            store,
            memory: MemoryManager::new(max_memory_percent),
            initial_batch_size: batch_size.max(MIN_BATCH_SIZE),
        }
    }

    /// Encodes `chunks` in batches and persists each batch into
    /// `collection` as it completes. Returns `false` (without erroring)
    /// the moment a batch's embedding count doesn't match its input
    /// count; batches already persisted before that point stay
    /// persisted. Returns `Ok(true)` once every chunk has been
    /// embedded and stored.
    pub async fn embed_chunks(&self, chunks: &[CodeChunk], collection: &str) -> Result<bool> {
        if chunks.is_empty() {
            return Ok(true);
        }

        let mut batch_size = self.initial_batch_size;
        let mut offset = 0;
        let mut batches_processed = 0usize;

        while offset < chunks.len() {
            let stats = self.memory.current_stats();
            if self.memory.is_under_pressure(&stats) {
                batch_size = (batch_size / 2).max(MIN_BATCH_SIZE);
                debug!(
                    percent_used = stats.percent_used,
                    new_batch_size = batch_size,
                    "memory pressure detected, halving embedding batch size"
                );
            }

            let end = (offset + batch_size).min(chunks.len());
            let batch = &chunks[offset..end];
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let started = std::time::Instant::now();
            let vectors = self.engine.embed_batch(&texts).await?;
            let embedding_time = started.elapsed();

            if vectors.len() != batch.len() {
                tracing::warn!(
                    requested = batch.len(),
                    returned = vectors.len(),
                    "embedding engine returned a mismatched batch, abandoning remainder"
                );
                return Ok(false);
            }

            self.store.add_embeddings(collection, batch, &vectors).await?;
            self.memory.cleanup();

            batches_processed += 1;
            if batches_processed % 10 == 0 {
                let stats = self.memory.current_stats();
                info!(
                    batches_processed,
                    chunks_embedded = end,
                    total_chunks = chunks.len(),
                    percent_used = stats.percent_used,
                    available_gb = stats.available_gb,
                    last_batch_ms = embedding_time.as_millis(),
                    "embedding progress"
                );
            } else {
                debug!(
                    batch_offset = offset,
                    batch_len = batch.len(),
                    last_batch_ms = embedding_time.as_millis(),
                    "embedded batch"
                );
            }

            offset = end;
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codegraph_core::{ChunkMetadata, ProjectId, SimilarityResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    struct FakeEngine {
        dim: usize,
        calls: AtomicUsize,
        short_count_on_call: Option<usize>,
    }

    #[async_trait]
    impl EmbeddingEngine for FakeEngine {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.short_count_on_call == Some(call) {
                return Ok(vec![vec![0.0; self.dim]; texts.len().saturating_sub(1)]);
            }
            Ok(texts.iter().map(|_| vec![0.1; self.dim]).collect())
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    struct FakeStore {
        stored: Mutex<Vec<CodeChunk>>,
    }

    #[async_trait]
    impl VectorStore for FakeStore {
        async fn create_collection(&self, _collection: &str) -> Result<()> {
            Ok(())
        }

        async fn add_embeddings(
            &self,
            _collection: &str,
            chunks: &[CodeChunk],
            vectors: &[Vec<f32>],
        ) -> Result<()> {
            assert_eq!(chunks.len(), vectors.len());
            self.stored.lock().await.extend_from_slice(chunks);
            Ok(())
        }

        async fn query(
            &self,
            _collection: &str,
            _vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<SimilarityResult>> {
            Ok(Vec::new())
        }

        async fn list_collections(&self, _project_id: &ProjectId) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn cleanup_project(&self, _project_id: &ProjectId) -> Result<()> {
            Ok(())
        }

        async fn delete_project(&self, _project_id: &ProjectId) -> Result<()> {
            Ok(())
        }
    }

    fn chunk(n: usize) -> CodeChunk {
        CodeChunk {
            id: format!("chunk-{n}"),
            text: format!("text {n}"),
            metadata: ChunkMetadata {
                file_path: "a.c".to_string(),
                file_name: "a.c".to_string(),
                module: "_root".to_string(),
                start_line: 1,
                end_line: 2,
                chunk_type: "function".to_string(),
                function_name: Some("foo".to_string()),
                chunk_tokens: 10,
            },
        }
    }

    #[tokio::test]
    async fn embeds_all_chunks_in_batches() {
        let engine = Arc::new(FakeEngine {
            dim: 4,
            calls: AtomicUsize::new(0),
            short_count_on_call: None,
        });
        let store = Arc::new(FakeStore {
            stored: Mutex::new(Vec::new()),
        });
        let embedder = Embedder::new(engine, store.clone(), 99.0, 3);

        let chunks: Vec<CodeChunk> = (0..10).map(chunk).collect();
        let ok = embedder.embed_chunks(&chunks, "proj_code_chunks").await.unwrap();

        assert!(ok);
        assert_eq!(store.stored.lock().await.len(), 10);
    }

    #[tokio::test]
    async fn empty_input_is_trivially_successful() {
        let engine = Arc::new(FakeEngine {
            dim: 4,
            calls: AtomicUsize::new(0),
            short_count_on_call: None,
        });
        let store = Arc::new(FakeStore {
            stored: Mutex::new(Vec::new()),
        });
        let embedder = Embedder::new(engine, store, 80.0, 16);

        assert!(embedder.embed_chunks(&[], "proj_code_chunks").await.unwrap());
    }

    #[tokio::test]
    async fn mismatched_batch_count_abandons_and_keeps_earlier_batches() {
        let engine = Arc::new(FakeEngine {
            dim: 4,
            calls: AtomicUsize::new(0),
            short_count_on_call: Some(1),
        });
        let store = Arc::new(FakeStore {
            stored: Mutex::new(Vec::new()),
        });
        let embedder = Embedder::new(engine, store.clone(), 99.0, 3);

        let chunks: Vec<CodeChunk> = (0..9).map(chunk).collect();
        let ok = embedder.embed_chunks(&chunks, "proj_code_chunks").await.unwrap();

        assert!(!ok);
        // First batch of 3 was persisted before the second batch failed.
        assert_eq!(store.stored.lock().await.len(), 3);
    }
}
