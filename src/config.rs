use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::document::EmptyContainerPolicy;
use crate::error::PipelineError;

pub const DEFAULT_QUESTION: &str = "Based on the dataset, give me the customer count?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAI,
}

impl ProviderKind {
    fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "OLLAMA",
            ProviderKind::OpenAI => "OPENAI",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Ollama => f.write_str("ollama"),
            ProviderKind::OpenAI => f.write_str("openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAI),
            other => Err(PipelineError::InvalidConfiguration(format!(
                "unknown provider `{}` (expected ollama or openai)",
                other
            ))),
        }
    }
}

/// Where chunk embeddings live for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Qdrant,
}

impl FromStr for StoreKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "qdrant" => Ok(StoreKind::Qdrant),
            other => Err(PipelineError::InvalidConfiguration(format!(
                "unknown store `{}` (expected memory or qdrant)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn from_env(kind: ProviderKind, timeout: Duration) -> Self {
        Self::from_lookup(kind, timeout, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(kind: ProviderKind, timeout: Duration, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = kind.env_prefix();
        let var = |suffix: &str| lookup(&format!("{}_{}", prefix, suffix));

        let api_url = var("API_URL").unwrap_or_else(|| match kind {
            ProviderKind::Ollama => "http://localhost:11434".to_string(),
            ProviderKind::OpenAI => "https://api.openai.com/v1".to_string(),
        });

        let chat_model = var("CHAT_MODEL").unwrap_or_else(|| match kind {
            ProviderKind::Ollama => "mistral".to_string(),
            ProviderKind::OpenAI => "gpt-4o-mini".to_string(),
        });

        let embedding_model = var("EMBEDDING_MODEL").unwrap_or_else(|| match kind {
            ProviderKind::Ollama => "nomic-embed-text".to_string(),
            ProviderKind::OpenAI => "text-embedding-3-small".to_string(),
        });

        let temperature = var("TEMPERATURE")
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.7);

        Self {
            kind,
            api_url,
            api_key: var("API_KEY").filter(|k| !k.trim().is_empty()),
            chat_model,
            embedding_model,
            temperature,
            timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_url: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Results scoring below this are dropped. `None` keeps everything.
    pub min_score: Option<f32>,
    pub null_literal: String,
    pub empty_containers: EmptyContainerPolicy,
    pub embed_batch_size: usize,
    pub timeout: Duration,
    pub provider: ProviderKind,
    pub store: StoreKind,
    pub qdrant_url: String,
    pub collection: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            chunk_size: 7500,
            chunk_overlap: 100,
            top_k: 4,
            min_score: None,
            null_literal: "None".to_string(),
            empty_containers: EmptyContainerPolicy::Skip,
            embed_batch_size: 32,
            timeout: Duration::from_secs(120),
            provider: ProviderKind::Ollama,
            store: StoreKind::Memory,
            qdrant_url: "http://localhost:6333".to_string(),
            collection: "rag-chroma".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            source_url: lookup("RAG_SOURCE_URL").filter(|u| !u.trim().is_empty()),
            chunk_size: parse_var(&lookup, "RAG_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(&lookup, "RAG_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: parse_var(&lookup, "RAG_TOP_K", defaults.top_k)?,
            min_score: lookup("RAG_MIN_SCORE")
                .map(|raw| {
                    raw.trim().parse::<f32>().map_err(|e| {
                        PipelineError::InvalidConfiguration(format!("RAG_MIN_SCORE=`{}`: {}", raw, e))
                    })
                })
                .transpose()?,
            null_literal: lookup("RAG_NULL_LITERAL").unwrap_or(defaults.null_literal),
            empty_containers: parse_var(&lookup, "RAG_EMPTY_CONTAINERS", defaults.empty_containers)?,
            embed_batch_size: parse_var(&lookup, "RAG_EMBED_BATCH_SIZE", defaults.embed_batch_size)?,
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "RAG_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            provider: parse_var(&lookup, "RAG_PROVIDER", defaults.provider)?,
            store: parse_var(&lookup, "RAG_STORE", defaults.store)?,
            qdrant_url: lookup("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            collection: lookup("RAG_COLLECTION").unwrap_or(defaults.collection),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(PipelineError::InvalidConfiguration(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "top_k must be at least 1".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "embedding batch size must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(PipelineError::InvalidConfiguration(
                "timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed source endpoint. Only http and https are accepted.
    pub fn source_url(&self) -> Result<Url, PipelineError> {
        let raw = self.source_url.as_deref().ok_or_else(|| {
            PipelineError::InvalidConfiguration(
                "no source endpoint configured (set RAG_SOURCE_URL or pass --source-url)".to_string(),
            )
        })?;
        let url = Url::parse(raw).map_err(|e| {
            PipelineError::InvalidConfiguration(format!("invalid source URL `{}`: {}", raw, e))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(PipelineError::InvalidConfiguration(format!(
                "unsupported source URL scheme `{}`",
                scheme
            ))),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, PipelineError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            PipelineError::InvalidConfiguration(format!("{}=`{}`: {}", key, raw, e))
        }),
        _ => Ok(default),
    }
}
