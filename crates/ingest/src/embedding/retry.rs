use std::time::Duration;

use tracing::warn;

use super::traits::{Embedder, EmbeddingError};

const BACKOFF_BASE_SECS: u64 = 1;
const BACKOFF_CAP_SECS: u64 = 10;

/// Retries up to `max_retries` times with exponential backoff (base 1s,
/// cap 10s) on transient embedding failures. HTTP errors are treated as
/// transient; API and dimension-mismatch errors are not retried.
pub async fn embed_batch_with_retry(
    embedder: &dyn Embedder,
    texts: &[&str],
    max_retries: u32,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut attempt = 0;
    loop {
        match embedder.embed_batch(texts).await {
            Ok(embeddings) => return Ok(embeddings),
            Err(EmbeddingError::Http(e)) if attempt < max_retries => {
                let delay = backoff_delay(attempt);
                warn!(attempt, error = %e, delay_secs = delay.as_secs(), "embedder call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let secs = BACKOFF_BASE_SECS.saturating_mul(1u64 << attempt.min(10)).min(BACKOFF_CAP_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct AlwaysApiError;

    #[async_trait]
    impl Embedder for AlwaysApiError {
        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Api("bad request".into()))
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    #[test]
    fn backoff_delay_doubles_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn api_errors_are_not_retried() {
        let embedder = AlwaysApiError;
        let result = embed_batch_with_retry(&embedder, &["x"], 3).await;
        assert!(matches!(result, Err(EmbeddingError::Api(_))));
    }
}
