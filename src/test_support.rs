//! Fakes and helpers shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::providers::traits::{CompletionProvider, EmbeddingProvider};

pub const VOCAB: &[&str] = &["customer", "count", "order", "total", "name", "city", "product", "price"];

/// Embeds text as word counts over `VOCAB`, plus a constant bias so no vector is zero.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl KeywordEmbedder {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("embedding model unavailable"));
        }
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector: Vec<f32> = VOCAB
        .iter()
        .map(|word| lower.matches(word).count() as f32)
        .collect();
    vector.push(0.1);
    vector
}

/// Records every prompt and answers with a canned reply.
pub struct RecordingModel {
    pub prompts: Mutex<Vec<String>>,
    reply: Result<String, String>,
}

impl RecordingModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: Ok(reply.to_string()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: Err(message.to_string()),
        })
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for RecordingModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.reply.clone().map_err(|e| anyhow!(e))
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok("recording-model".to_string())
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn customers_json() -> serde_json::Value {
    let cities = ["Oslo", "Lima", "Pune"];
    let mut customers = Vec::new();
    for i in 0..12 {
        customers.push(serde_json::json!({
            "name": format!("Customer {}", i),
            "city": cities[i % 3],
            "orders": [{"product": "widget", "price": 10 + i}]
        }));
    }
    serde_json::json!({
        "summary": {"customer_count": 12, "region": "global"},
        "customers": customers
    })
}
