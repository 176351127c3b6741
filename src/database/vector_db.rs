use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::providers::traits::EmbeddingProvider;

/// Opaque reference to an index produced by [`VectorStore::build`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexHandle(Uuid);

impl IndexHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub(crate) fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chunk with its embedding, owned by the index that stored it.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub id: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Box<[f32]>,
}

/// A retrieved chunk and its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Similarity engine holding chunk embeddings.
///
/// `build` is all-or-nothing: on error no handle is returned and nothing
/// stored is reachable. Built indexes are never modified afterwards.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn build(&self, chunks: &[String]) -> Result<IndexHandle, PipelineError>;

    /// Up to `k` chunks, highest score first.
    async fn query(
        &self,
        handle: &IndexHandle,
        question: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError>;
}

/// Embeds `chunks` in batches, keeping input order, and checks that every chunk
/// got exactly one vector of a common, non-zero dimension.
pub async fn embed_chunks(
    embedder: &Arc<dyn EmbeddingProvider>,
    chunks: &[String],
    batch_size: usize,
    concurrency: usize,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let batch_size = batch_size.max(1);

    let futures: Vec<BoxFuture<'static, Result<Vec<Vec<f32>>, PipelineError>>> = chunks
        .chunks(batch_size)
        .map(|batch| {
            let batch = batch.to_vec();
            let embedder = Arc::clone(embedder);
            async move {
                let vectors = embedder
                    .embed(&batch)
                    .await
                    .map_err(|e| PipelineError::EmbeddingFailure(e.to_string()))?;
                if vectors.len() != batch.len() {
                    return Err(PipelineError::EmbeddingFailure(format!(
                        "{} returned {} vectors for {} chunks",
                        embedder.model_name(),
                        vectors.len(),
                        batch.len()
                    )));
                }
                Ok(vectors)
            }
            .boxed()
        })
        .collect();

    let batches: Vec<Vec<Vec<f32>>> = stream::iter(futures)
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();

    if let Some(first) = vectors.first() {
        let dim = first.len();
        if dim == 0 {
            return Err(PipelineError::EmbeddingFailure(
                "embedding model returned empty vectors".to_string(),
            ));
        }
        if let Some(pos) = vectors.iter().position(|v| v.len() != dim) {
            return Err(PipelineError::EmbeddingFailure(format!(
                "chunk {} embedded with dimension {}, expected {}",
                pos,
                vectors[pos].len(),
                dim
            )));
        }
        if let Some(pos) = vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
            return Err(PipelineError::EmbeddingFailure(format!(
                "chunk {} embedded with a non-finite value",
                pos
            )));
        }
    }

    Ok(vectors)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    // overflowing norms give NaN
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::KeywordEmbedder;
    use anyhow::Result;
    use std::sync::atomic::Ordering;

    struct RaggedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for RaggedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![1.0; t.len()]).collect())
        }

        fn model_name(&self) -> &str {
            "ragged"
        }
    }

    struct NanEmbedder;

    #[async_trait]
    impl EmbeddingProvider for NanEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| if i == 1 { vec![f32::NAN, 1.0] } else { vec![1.0, 0.0] })
                .collect())
        }

        fn model_name(&self) -> &str {
            "nan"
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_never_nan() {
        let score = cosine_similarity(&[f32::MAX, f32::MAX], &[f32::MAX, 1.0]);
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_embed_chunks_rejects_non_finite_vectors() {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(NanEmbedder);
        let chunks = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = embed_chunks(&embedder, &chunks, 8, 1).await.unwrap_err();
        match err {
            PipelineError::EmbeddingFailure(message) => assert!(message.contains("chunk 1")),
            other => panic!("expected EmbeddingFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_chunks_batches_in_order() {
        let keyword = Arc::new(KeywordEmbedder::default());
        let embedder: Arc<dyn EmbeddingProvider> = keyword.clone();
        let chunks: Vec<String> = (0..7).map(|i| "customer ".repeat(i)).collect();

        let vectors = embed_chunks(&embedder, &chunks, 3, 2).await.unwrap();
        assert_eq!(vectors.len(), 7);
        assert_eq!(keyword.calls.load(Ordering::SeqCst), 3);
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v[0], i as f32);
        }
    }

    #[tokio::test]
    async fn test_embed_chunks_rejects_mixed_dimensions() {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(RaggedEmbedder);
        let chunks = vec!["ab".to_string(), "abc".to_string()];
        let err = embed_chunks(&embedder, &chunks, 8, 1).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingFailure(_)));
    }

    #[tokio::test]
    async fn test_embed_chunks_maps_provider_error() {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(KeywordEmbedder::failing());
        let err = embed_chunks(&embedder, &["a".to_string()], 8, 1).await.unwrap_err();
        match err {
            PipelineError::EmbeddingFailure(message) => assert!(message.contains("unavailable")),
            other => panic!("expected EmbeddingFailure, got {:?}", other),
        }
    }
}
