pub mod http;

use async_trait::async_trait;

use crate::document::StructuredRecord;
use crate::error::PipelineError;

pub use http::HttpJsonSource;

/// Supplier of the raw record a pipeline run ingests.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self) -> Result<StructuredRecord, PipelineError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Serves a record that is already in memory.
#[derive(Debug, Clone)]
pub struct StaticSource {
    record: StructuredRecord,
}

impl StaticSource {
    pub fn new(record: impl Into<StructuredRecord>) -> Self {
        Self {
            record: record.into(),
        }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn fetch(&self) -> Result<StructuredRecord, PipelineError> {
        Ok(self.record.clone())
    }

    fn describe(&self) -> String {
        "static record".to_string()
    }
}
