use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::document::StructuredRecord;
use crate::error::PipelineError;
use crate::source::RecordSource;

/// Longest slice of an error body kept in a `FetchFailure` message.
const MAX_ERROR_BODY: usize = 512;

/// Fetches one JSON document with an HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    client: Client,
    url: Url,
}

impl HttpJsonSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::FetchFailure {
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RecordSource for HttpJsonSource {
    async fn fetch(&self) -> Result<StructuredRecord, PipelineError> {
        log::debug!("GET {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::FetchFailure {
                status: None,
                message: format!("request to {} failed: {}", self.url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(PipelineError::FetchFailure {
                status: Some(status.as_u16()),
                message: format!("{} returned {}: {}", self.url, status, snippet.trim()),
            });
        }

        let json: Value = response.json().await.map_err(|e| PipelineError::FetchFailure {
            status: Some(status.as_u16()),
            message: format!("{} returned a body that is not valid JSON: {}", self.url, e),
        })?;

        Ok(StructuredRecord::from(json))
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
