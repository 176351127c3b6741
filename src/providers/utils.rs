use std::future::Future;
use std::time::Duration;

use crate::error::{PipelineError, Stage};

/// Bounds an external call, turning an elapsed deadline into `Timeout` for `stage`.
pub async fn with_timeout<T, F>(stage: Stage, limit: Duration, call: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("{} call exceeded {:?}", stage, limit);
            Err(PipelineError::Timeout { stage, after: limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result = with_timeout(Stage::Fetch, Duration::from_secs(1), async { Ok::<_, PipelineError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let result = with_timeout(Stage::Compose, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, PipelineError>(())
        })
        .await;
        match result {
            Err(PipelineError::Timeout { stage, after }) => {
                assert_eq!(stage, Stage::Compose);
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inner_error_is_kept() {
        let result: Result<(), _> = with_timeout(Stage::Index, Duration::from_secs(1), async {
            Err(PipelineError::EmbeddingFailure("model not loaded".to_string()))
        })
        .await;
        assert!(matches!(result, Err(PipelineError::EmbeddingFailure(_))));
    }
}
