use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider};

/// Chat and embeddings against a local Ollama server.
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build Ollama HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Ollama request failed: Status {}, Body: {}", status, error_text));
        }

        let response_json: Value = response.json().await?;
        if let Some(error) = response_json.get("error") {
            return Err(anyhow!("Ollama returned error: {}", error));
        }
        Ok(response_json)
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response_json = self
            .post_json(
                "/api/chat",
                &json!({
                    "model": self.chat_model,
                    "messages": [
                        {
                            "role": "user",
                            "content": prompt
                        }
                    ],
                    "stream": false,
                    "options": {
                        "temperature": self.temperature
                    }
                }),
            )
            .await?;

        response_json
            .get("message")
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Invalid chat response format: {}", response_json))
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.chat_model.clone())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response_json = self
            .post_json(
                "/api/embed",
                &json!({
                    "model": self.embedding_model,
                    "input": texts
                }),
            )
            .await?;

        let parsed: EmbedResponse = serde_json::from_value(response_json)
            .context("Invalid embedding response format")?;
        Ok(parsed.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}
