use crate::backends::CompletionBackend;
use async_trait::async_trait;
use council_core::{CouncilError, CouncilResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Configures retry behaviour for transient provider errors. Missing fields
/// take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Leading text of every provider error that carries an HTTP status.
pub const HTTP_STATUS_PREFIX: &str = "HTTP ";

/// Leading text of a provider error for a request that timed out.
pub const TIMED_OUT_PREFIX: &str = "request timed out: ";

/// The HTTP status a provider error starts with, if any.
pub fn http_status(err: &CouncilError) -> Option<u16> {
    let CouncilError::CompletionUnavailable(message) = err else {
        return None;
    };
    message
        .strip_prefix(HTTP_STATUS_PREFIX)?
        .split(|c: char| !c.is_ascii_digit())
        .next()?
        .parse()
        .ok()
}

/// Determines whether an error is transient and worth retrying.
///
/// Returns `true` for rate-limit (429) and server errors (500, 502, 503,
/// 504) by status code, and for request timeouts. Everything else,
/// including client errors such as 400, is returned immediately.
pub fn is_retryable(err: &CouncilError) -> bool {
    let CouncilError::CompletionUnavailable(message) = err else {
        return false;
    };
    match http_status(err) {
        Some(status) => matches!(status, 429 | 500 | 502 | 503 | 504),
        None => message.starts_with(TIMED_OUT_PREFIX),
    }
}

/// Computes the backoff delay for a given attempt using exponential backoff
/// capped at `backoff_max_ms`.
fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// A [`CompletionBackend`] that retries transient failures of an inner
/// backend with exponential backoff. Non-retryable errors are returned
/// immediately; when every attempt fails, the last error is returned.
pub struct RetryingBackend {
    inner: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn CompletionBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl CompletionBackend for RetryingBackend {
    async fn complete(&self, prompt: &str) -> CouncilResult<String> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if !is_retryable(&e) => {
                    warn!(attempt, error = %e, "Non-retryable completion error");
                    return Err(e);
                }
                Err(e) if attempt >= self.policy.max_retries => {
                    warn!(attempt, error = %e, "Retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    let delay = compute_backoff(&self.policy, attempt);
                    info!(attempt, delay_ms = delay, error = %e, "Retryable error, backing off");
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A mock backend that returns a sequence of results.
    struct MockBackend {
        results: tokio::sync::Mutex<Vec<CouncilResult<String>>>,
        call_count: AtomicU32,
    }

    impl MockBackend {
        fn new(results: Vec<CouncilResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                results: tokio::sync::Mutex::new(results),
                call_count: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for MockBackend {
        async fn complete(&self, _prompt: &str) -> CouncilResult<String> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().await;
            if results.is_empty() {
                Err(CouncilError::CompletionUnavailable("no more results".into()))
            } else {
                results.remove(0)
            }
        }
    }

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
        }
    }

    fn unavailable(msg: &str) -> CouncilResult<String> {
        Err(CouncilError::CompletionUnavailable(msg.into()))
    }

    #[tokio::test]
    async fn retry_succeeds_on_second_try() {
        let mock = MockBackend::new(vec![
            unavailable("HTTP 429 from mock: slow down"),
            Ok("ok".into()),
        ]);
        let backend = RetryingBackend::new(mock.clone(), instant_policy());
        assert_eq!(backend.complete("hi").await.unwrap(), "ok");
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn non_retryable_returns_immediately() {
        let mock = MockBackend::new(vec![
            unavailable("HTTP 400 from mock: bad request"),
            Ok("never".into()),
        ]);
        let backend = RetryingBackend::new(mock.clone(), instant_policy());
        assert!(backend.complete("hi").await.is_err());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn retries_exhausted_returns_last_error() {
        let mock = MockBackend::new(vec![
            unavailable("HTTP 503 from mock: attempt a"),
            unavailable("HTTP 503 from mock: attempt b"),
            unavailable("HTTP 503 from mock: attempt c"),
            unavailable("HTTP 503 from mock: attempt d"),
        ]);
        let backend = RetryingBackend::new(mock.clone(), instant_policy());
        let err = backend.complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("attempt d"));
        assert_eq!(mock.calls(), 4);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(compute_backoff(&policy, 0), 500);
        assert_eq!(compute_backoff(&policy, 2), 2000);
        assert_eq!(compute_backoff(&policy, 20), 30_000);
    }

    #[test]
    fn only_completion_errors_are_retryable() {
        assert!(is_retryable(&CouncilError::CompletionUnavailable(format!(
            "{TIMED_OUT_PREFIX}operation timed out"
        ))));
        assert!(!is_retryable(&CouncilError::NotFound("HTTP 503".into())));
    }

    #[test]
    fn classification_uses_status_not_body() {
        let overloaded = CouncilError::CompletionUnavailable(
            r#"HTTP 503 from OpenAI API: {"max_tokens": 4000}"#.into(),
        );
        assert_eq!(http_status(&overloaded), Some(503));
        assert!(is_retryable(&overloaded));

        let bad_request = CouncilError::CompletionUnavailable(
            "HTTP 400 from Claude API: upstream said 503".into(),
        );
        assert_eq!(http_status(&bad_request), Some(400));
        assert!(!is_retryable(&bad_request));

        let no_status = CouncilError::CompletionUnavailable("connection refused 503".into());
        assert_eq!(http_status(&no_status), None);
        assert!(!is_retryable(&no_status));
    }
}
