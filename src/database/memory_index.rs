//! In-process vector store scoring every chunk by cosine similarity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::database::vector_db::{
    cosine_similarity, embed_chunks, IndexHandle, IndexedChunk, ScoredChunk, VectorStore,
};
use crate::error::PipelineError;
use crate::providers::traits::EmbeddingProvider;

pub struct MemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    concurrency: usize,
    indexes: RwLock<HashMap<IndexHandle, Arc<[IndexedChunk]>>>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size,
            concurrency: 4,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Number of embedding batches in flight during `build`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Chunks stored under `handle`, in build order.
    pub fn chunks(&self, handle: &IndexHandle) -> Option<Arc<[IndexedChunk]>> {
        self.indexes.read().get(handle).cloned()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn build(&self, chunks: &[String]) -> Result<IndexHandle, PipelineError> {
        let vectors = embed_chunks(&self.embedder, chunks, self.batch_size, self.concurrency).await?;

        let handle = IndexHandle::new();
        let indexed: Arc<[IndexedChunk]> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| IndexedChunk {
                id: format!("{}-{}", handle.simple(), i),
                chunk_index: i,
                text: text.clone(),
                embedding: vector.into_boxed_slice(),
            })
            .collect();

        log::info!(
            "Indexed {} chunks in memory with {} (handle {})",
            indexed.len(),
            self.embedder.model_name(),
            handle
        );
        self.indexes.write().insert(handle.clone(), indexed);
        Ok(handle)
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        question: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let chunks = self
            .chunks(handle)
            .ok_or_else(|| PipelineError::InvalidIndexHandle(handle.to_string()))?;

        if chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed_query(question)
            .await
            .map_err(|e| PipelineError::RetrievalFailure(format!("failed to embed question: {}", e)))?;

        let dim = chunks[0].embedding.len();
        if query_vector.len() != dim {
            return Err(PipelineError::RetrievalFailure(format!(
                "question embedded with dimension {}, index uses {}",
                query_vector.len(),
                dim
            )));
        }
        if query_vector.iter().any(|x| !x.is_finite()) {
            return Err(PipelineError::RetrievalFailure(
                "question embedding contains a non-finite value".to_string(),
            ));
        }

        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                score: cosine_similarity(&query_vector, &chunk.embedding),
            })
            .collect();

        // stable sort keeps build order among equal scores
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}
