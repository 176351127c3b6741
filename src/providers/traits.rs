use anyhow::Result;
use async_trait::async_trait;

/// Language-model capability: one prompt in, generated text out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn get_model_info(&self) -> Result<String>;
}

/// Embedding capability: one fixed-dimension vector per input string.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns vectors in the same order as `texts`.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            anyhow::bail!("expected 1 embedding for the query, got {}", vectors.len());
        }
        Ok(vectors.remove(0))
    }

    fn model_name(&self) -> &str;
}
