use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Flatten,
    Chunk,
    Index,
    Retrieve,
    Compose,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Flatten => "flatten",
            Stage::Chunk => "chunk",
            Stage::Index => "index",
            Stage::Retrieve => "retrieve",
            Stage::Compose => "compose",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Fetch failed{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    FetchFailure {
        status: Option<u16>,
        message: String,
    },
    #[error("Unsupported scalar type `{kind}` at path `{path}`")]
    UnsupportedScalarType { path: String, kind: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),
    #[error("Retrieval failed: {0}")]
    RetrievalFailure(String),
    #[error("Generation failed: {0}")]
    GenerationFailure(String),
    #[error("Invalid index handle: {0}")]
    InvalidIndexHandle(String),
    #[error("{stage} call timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
}

impl PipelineError {
    /// HTTP status preserved from a failed fetch, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::FetchFailure { status, .. } => *status,
            _ => None,
        }
    }
}

/// Failure of a whole pipeline run, tagged with the stage that aborted it.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl RunError {
    pub fn new(stage: Stage, source: PipelineError) -> Self {
        Self { stage, source }
    }
}

/// Attaches a stage tag to a stage result.
pub trait StageExt<T> {
    fn at_stage(self, stage: Stage) -> Result<T, RunError>;
}

impl<T> StageExt<T> for Result<T, PipelineError> {
    fn at_stage(self, stage: Stage) -> Result<T, RunError> {
        self.map_err(|e| RunError::new(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failure_keeps_status() {
        let err = PipelineError::FetchFailure {
            status: Some(503),
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "Fetch failed (HTTP 503): Service Unavailable");

        let err = PipelineError::FetchFailure {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Fetch failed: connection refused");
    }

    #[test]
    fn test_run_error_is_stage_tagged() {
        let result: Result<(), PipelineError> =
            Err(PipelineError::InvalidConfiguration("overlap 50 >= chunk size 50".to_string()));
        let err = result.at_stage(Stage::Chunk).unwrap_err();
        assert_eq!(err.stage, Stage::Chunk);
        assert_eq!(
            err.to_string(),
            "chunk stage failed: Invalid configuration: overlap 50 >= chunk size 50"
        );
    }
}
