use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, value::Kind, vectors_config::Config,
        with_payload_selector::SelectorOptions, CreateCollection, DeleteCollection, Distance,
        PointId, PointStruct, ScoredPoint, SearchPoints, UpsertPoints, Value, VectorParams,
        VectorsConfig, WithPayloadSelector,
    },
    Qdrant,
};
use uuid::Uuid;

use crate::database::vector_db::{embed_chunks, IndexHandle, ScoredChunk, VectorStore};
use crate::error::PipelineError;
use crate::providers::traits::EmbeddingProvider;

const UPSERT_BATCH: usize = 256;

/// Vector store backed by a Qdrant server. Each build gets its own collection.
pub struct QdrantVectorStore {
    client: Arc<Qdrant>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection_prefix: String,
    batch_size: usize,
    // None marks an index built from zero chunks
    collections: RwLock<HashMap<IndexHandle, Option<String>>>,
}

impl QdrantVectorStore {
    pub fn new(
        client: Qdrant,
        embedder: Arc<dyn EmbeddingProvider>,
        collection_prefix: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            client: Arc::new(client),
            embedder,
            collection_prefix: collection_prefix.into(),
            batch_size,
            collections: RwLock::new(HashMap::new()),
        }
    }

    async fn create_collection(&self, name: &str, vector_size: u64) -> Result<(), PipelineError> {
        let vectors_config = VectorParams {
            size: vector_size,
            distance: Distance::Cosine.into(),
            ..Default::default()
        };

        let create_collection = CreateCollection {
            collection_name: name.to_string(),
            vectors_config: Some(VectorsConfig {
                config: Some(Config::Params(vectors_config)),
            }),
            ..Default::default()
        };

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| PipelineError::EmbeddingFailure(format!("failed to create collection {}: {}", name, e)))?;
        Ok(())
    }

    async fn upsert(&self, name: &str, chunks: &[String], vectors: Vec<Vec<f32>>) -> Result<(), PipelineError> {
        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| {
                let payload: HashMap<String, Value> = [
                    ("text".to_string(), Value::from(text.clone())),
                    ("chunk_index".to_string(), Value::from(i as i64)),
                ]
                .into_iter()
                .collect();

                PointStruct {
                    id: Some(PointId {
                        point_id_options: Some(PointIdOptions::Uuid(Uuid::new_v4().to_string())),
                    }),
                    vectors: Some(vector.into()),
                    payload,
                    ..Default::default()
                }
            })
            .collect();

        let mut remaining = points;
        while !remaining.is_empty() {
            let rest = remaining.split_off(remaining.len().min(UPSERT_BATCH));
            let upsert_points = UpsertPoints {
                collection_name: name.to_string(),
                wait: Some(true),
                points: remaining,
                ..Default::default()
            };
            self.client
                .upsert_points(upsert_points)
                .await
                .map_err(|e| PipelineError::EmbeddingFailure(format!("failed to store vectors in {}: {}", name, e)))?;
            remaining = rest;
        }
        Ok(())
    }
}

async fn drop_collection(client: &Qdrant, name: &str) {
    let request = DeleteCollection {
        collection_name: name.to_string(),
        ..Default::default()
    };
    if let Err(e) = client.delete_collection(request).await {
        log::warn!("Failed to remove incomplete collection {}: {}", name, e);
    } else {
        log::info!("Removed incomplete collection {}", name);
    }
}

/// Deletes a collection on drop unless disarmed. Covers both a failed upsert and
/// a build future cancelled by its timeout.
struct CollectionGuard {
    client: Arc<Qdrant>,
    name: Option<String>,
}

impl CollectionGuard {
    fn new(client: Arc<Qdrant>, name: String) -> Self {
        Self {
            client,
            name: Some(name),
        }
    }

    fn disarm(mut self) -> String {
        self.name.take().unwrap_or_default()
    }
}

impl Drop for CollectionGuard {
    fn drop(&mut self) {
        let Some(name) = self.name.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = Arc::clone(&self.client);
                runtime.spawn(async move { drop_collection(&client, &name).await });
            }
            Err(_) => log::warn!("No runtime to remove incomplete collection {}", name),
        }
    }
}

fn to_scored_chunk(point: ScoredPoint) -> Option<ScoredChunk> {
    let text = match point.payload.get("text")?.kind.as_ref()? {
        Kind::StringValue(s) => s.clone(),
        _ => return None,
    };
    let chunk_index = match point.payload.get("chunk_index").and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(i)) => *i as usize,
        _ => 0,
    };
    Some(ScoredChunk {
        chunk_index,
        text,
        score: point.score,
    })
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn build(&self, chunks: &[String]) -> Result<IndexHandle, PipelineError> {
        let vectors = embed_chunks(&self.embedder, chunks, self.batch_size, 1).await?;
        let handle = IndexHandle::new();

        let Some(dim) = vectors.first().map(|v| v.len() as u64) else {
            self.collections.write().insert(handle.clone(), None);
            return Ok(handle);
        };

        let name = format!("{}-{}", self.collection_prefix, handle.simple());
        self.create_collection(&name, dim).await?;
        let guard = CollectionGuard::new(Arc::clone(&self.client), name.clone());
        self.upsert(&name, chunks, vectors).await?;
        let name = guard.disarm();

        log::info!("Indexed {} chunks into Qdrant collection {}", chunks.len(), name);
        self.collections.write().insert(handle.clone(), Some(name));
        Ok(handle)
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        question: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let collection = self
            .collections
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| PipelineError::InvalidIndexHandle(handle.to_string()))?;

        let Some(collection) = collection else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed_query(question)
            .await
            .map_err(|e| PipelineError::RetrievalFailure(format!("failed to embed question: {}", e)))?;

        let request = SearchPoints {
            collection_name: collection.clone(),
            vector: query_vector,
            limit: k as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| PipelineError::RetrievalFailure(format!("search in {} failed: {}", collection, e)))?;

        let mut results: Vec<ScoredChunk> = response.result.into_iter().filter_map(to_scored_chunk).collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(payload: Vec<(&str, Value)>, score: f32) -> ScoredPoint {
        ScoredPoint {
            payload: payload.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            score,
            ..Default::default()
        }
    }

    #[test]
    fn test_to_scored_chunk() {
        let chunk = to_scored_chunk(point(
            vec![
                ("text", Value::from("customer_count: 12".to_string())),
                ("chunk_index", Value::from(3_i64)),
            ],
            0.9,
        ))
        .unwrap();
        assert_eq!(chunk.text, "customer_count: 12");
        assert_eq!(chunk.chunk_index, 3);
        assert!((chunk.score - 0.9).abs() < f32::EPSILON);
    }

    fn unreachable_client() -> Arc<Qdrant> {
        let config = qdrant_client::config::QdrantConfig::from_url("http://127.0.0.1:1");
        Arc::new(Qdrant::new(config).unwrap())
    }

    #[test]
    fn test_disarmed_guard_keeps_collection() {
        let guard = CollectionGuard::new(unreachable_client(), "rag-chroma-abc".to_string());
        assert_eq!(guard.disarm(), "rag-chroma-abc");
    }

    #[tokio::test]
    async fn test_cancelled_build_schedules_cleanup() {
        let guard = CollectionGuard::new(unreachable_client(), "rag-chroma-abc".to_string());
        let pending = async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        };
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        // the cleanup task runs against an unreachable server and only logs
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_guard_without_runtime_does_not_panic() {
        drop(CollectionGuard::new(unreachable_client(), "rag-chroma-abc".to_string()));
    }

    #[test]
    fn test_point_without_text_is_skipped() {
        assert!(to_scored_chunk(point(vec![("chunk_index", Value::from(1_i64))], 0.5)).is_none());
    }
}
