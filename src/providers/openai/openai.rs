use anyhow::{anyhow, Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
        CreateEmbeddingRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider};

#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY must be set for the OpenAI provider"))?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build OpenAI HTTP client")?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(config.api_url.trim_end_matches('/'));

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?
            .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .temperature(self.temperature)
            .messages(vec![message])
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("No response content"))
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok(self.chat_model.clone())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(texts.to_vec())
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        let mut data = response.data;
        data.sort_by_key(|embedding| embedding.index);
        Ok(data.into_iter().map(|embedding| embedding.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}
