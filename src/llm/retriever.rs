use std::sync::Arc;

use crate::database::vector_db::{IndexHandle, ScoredChunk, VectorStore};
use crate::error::PipelineError;

/// Chunks for one question, best match first.
pub type RetrievalResult = Vec<ScoredChunk>;

/// Top-K lookup against one built index.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    handle: IndexHandle,
    top_k: usize,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, handle: IndexHandle, top_k: usize) -> Result<Self, PipelineError> {
        if top_k == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "top_k must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            store,
            handle,
            top_k,
            min_score: None,
        })
    }

    /// Drops results scoring below `min_score`. Off unless set.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult, PipelineError> {
        let mut results = self.store.query(&self.handle, question, self.top_k).await?;
        results.truncate(self.top_k);

        if let Some(min_score) = self.min_score {
            let before = results.len();
            results.retain(|chunk| chunk.score >= min_score);
            if results.is_empty() && before > 0 {
                log::warn!(
                    "All {} retrieved chunks scored below the minimum of {}",
                    before,
                    min_score
                );
            }
        }

        log::info!("Retrieved {} chunks (top_k {})", results.len(), self.top_k);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Returns a fixed ranking regardless of the question.
    struct FixedStore {
        handle: IndexHandle,
        results: Vec<ScoredChunk>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn build(&self, _chunks: &[String]) -> Result<IndexHandle, PipelineError> {
            Ok(self.handle.clone())
        }

        async fn query(
            &self,
            handle: &IndexHandle,
            _question: &str,
            k: usize,
        ) -> Result<Vec<ScoredChunk>, PipelineError> {
            if *handle != self.handle {
                return Err(PipelineError::InvalidIndexHandle(handle.to_string()));
            }
            Ok(self.results.iter().take(k).cloned().collect())
        }
    }

    fn scored(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk_index: 0,
            text: text.to_string(),
            score,
        }
    }

    fn fixed_store() -> Arc<FixedStore> {
        Arc::new(FixedStore {
            handle: IndexHandle::new(),
            results: vec![scored("a", 0.9), scored("b", 0.7), scored("c", 0.4), scored("d", 0.1)],
        })
    }

    #[tokio::test]
    async fn test_retrieve_passes_top_k() {
        let store = fixed_store();
        let retriever = Retriever::new(store.clone(), store.handle.clone(), 3).unwrap();
        let results = retriever.retrieve("q").await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_min_score_filter() {
        let store = fixed_store();
        let retriever = Retriever::new(store.clone(), store.handle.clone(), 4)
            .unwrap()
            .with_min_score(Some(0.5));
        let results = retriever.retrieve("q").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_handle() {
        let store = fixed_store();
        let retriever = Retriever::new(store, IndexHandle::new(), 4).unwrap();
        let err = retriever.retrieve("q").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidIndexHandle(_)));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let store = fixed_store();
        assert!(Retriever::new(store.clone(), store.handle.clone(), 0).is_err());
    }
}
