use crate::backends::{build_backend, CompletionBackend};
use crate::config::EngineConfig;
use crate::failover::{RetryPolicy, RetryingBackend};
use council_core::{CouncilError, CouncilResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default bound on a single completion call.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(300);

/// One engine: the provider backend and, when the engine has a retry
/// policy, the retrying wrapper around it.
struct Engine {
    direct: Arc<dyn CompletionBackend>,
    retrying: Option<Arc<dyn CompletionBackend>>,
}

/// Lookup table from engine id to backend, plus the per-call time bound.
///
/// Every failure (unknown engine, backend error, timeout) is reported as
/// [`CouncilError::CompletionUnavailable`].
pub struct CompletionGateway {
    engines: HashMap<String, Engine>,
    timeout: Option<Duration>,
}

impl CompletionGateway {
    /// Empty gateway with the default timeout.
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
            timeout: Some(DEFAULT_COMPLETION_TIMEOUT),
        }
    }

    /// Builds one backend per engine entry. Duplicate ids are rejected.
    pub fn from_configs(configs: Vec<EngineConfig>) -> CouncilResult<Self> {
        let mut gateway = Self::new();
        for config in configs {
            if gateway.has_engine(&config.id) {
                return Err(CouncilError::Config(format!(
                    "engine '{}' is configured more than once",
                    config.id
                )));
            }
            let id = config.id.clone();
            let policy = config.retry_policy.clone();
            let backend = build_backend(config);
            match policy {
                Some(policy) => gateway.register_with_retry(id, backend, policy),
                None => gateway.register(id, backend),
            }
        }
        Ok(gateway)
    }

    /// Sets the per-call bound; `Duration::ZERO` disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Registers (or replaces) the backend for an engine id.
    pub fn register(&mut self, engine_id: impl Into<String>, backend: Arc<dyn CompletionBackend>) {
        let engine = Engine {
            direct: backend,
            retrying: None,
        };
        self.engines.insert(engine_id.into(), engine);
    }

    /// Registers a backend whose transient failures [`complete`](Self::complete)
    /// retries under `policy`. [`complete_once`](Self::complete_once) still
    /// makes a single attempt.
    pub fn register_with_retry(
        &mut self,
        engine_id: impl Into<String>,
        backend: Arc<dyn CompletionBackend>,
        policy: RetryPolicy,
    ) {
        let retrying = (policy.max_retries > 0).then(|| {
            Arc::new(RetryingBackend::new(backend.clone(), policy)) as Arc<dyn CompletionBackend>
        });
        let engine = Engine {
            direct: backend,
            retrying,
        };
        self.engines.insert(engine_id.into(), engine);
    }

    pub fn has_engine(&self, engine_id: &str) -> bool {
        self.engines.contains_key(engine_id)
    }

    /// Registered engine ids, sorted.
    pub fn engines(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.engines.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Runs one completion on `engine_id`, retrying transient failures when
    /// the engine has a retry policy.
    pub async fn complete(&self, engine_id: &str, prompt: &str) -> CouncilResult<String> {
        let engine = self.engine(engine_id)?;
        let backend = engine.retrying.as_ref().unwrap_or(&engine.direct);
        self.call(engine_id, backend.as_ref(), prompt).await
    }

    /// Runs exactly one attempt on `engine_id`, ignoring any retry policy.
    pub async fn complete_once(&self, engine_id: &str, prompt: &str) -> CouncilResult<String> {
        let engine = self.engine(engine_id)?;
        self.call(engine_id, engine.direct.as_ref(), prompt).await
    }

    fn engine(&self, engine_id: &str) -> CouncilResult<&Engine> {
        self.engines.get(engine_id).ok_or_else(|| {
            CouncilError::CompletionUnavailable(format!(
                "no backend configured for engine '{engine_id}'"
            ))
        })
    }

    async fn call(
        &self,
        engine_id: &str,
        backend: &dyn CompletionBackend,
        prompt: &str,
    ) -> CouncilResult<String> {
        let start = Instant::now();
        debug!(engine = %engine_id, prompt_len = prompt.len(), "Completion request");

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, backend.complete(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(CouncilError::CompletionUnavailable(format!(
                    "engine '{engine_id}' timed out after {}s",
                    limit.as_secs()
                ))),
            },
            None => backend.complete(prompt).await,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(text) => debug!(
                engine = %engine_id,
                duration_ms,
                response_len = text.len(),
                "Completion finished"
            ),
            Err(e) => warn!(engine = %engine_id, duration_ms, error = %e, "Completion failed"),
        }
        result
    }
}

impl Default for CompletionGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Echo;

    #[async_trait]
    impl CompletionBackend for Echo {
        async fn complete(&self, prompt: &str) -> CouncilResult<String> {
            Ok(format!("echo: {prompt}"))
        }
    }

    struct Hang;

    #[async_trait]
    impl CompletionBackend for Hang {
        async fn complete(&self, _prompt: &str) -> CouncilResult<String> {
            std::future::pending().await
        }
    }

    /// Always fails with a retryable status and counts attempts.
    struct Overloaded {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CompletionBackend for Overloaded {
        async fn complete(&self, _prompt: &str) -> CouncilResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CouncilError::CompletionUnavailable(
                "HTTP 503 from mock: overloaded".into(),
            ))
        }
    }

    fn overloaded_gateway() -> (CompletionGateway, Arc<Overloaded>) {
        let backend = Arc::new(Overloaded {
            calls: AtomicU32::new(0),
        });
        let mut gateway = CompletionGateway::new();
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
        };
        gateway.register_with_retry("busy", backend.clone(), policy);
        (gateway, backend)
    }

    #[tokio::test]
    async fn test_complete_applies_retry_policy() {
        let (gateway, backend) = overloaded_gateway();
        assert!(gateway.complete("busy", "hi").await.is_err());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_complete_once_makes_single_attempt() {
        let (gateway, backend) = overloaded_gateway();
        let err = gateway.complete_once("busy", "hi").await.unwrap_err();
        assert!(matches!(err, CouncilError::CompletionUnavailable(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_by_engine_id() {
        let mut gateway = CompletionGateway::new();
        gateway.register("echo", Arc::new(Echo));
        assert_eq!(gateway.complete("echo", "hi").await.unwrap(), "echo: hi");
        assert_eq!(gateway.engines(), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_unknown_engine_is_unavailable() {
        let gateway = CompletionGateway::new();
        let err = gateway.complete("missing", "hi").await.unwrap_err();
        assert!(matches!(err, CouncilError::CompletionUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unavailable() {
        let mut gateway = CompletionGateway::new().with_timeout(Duration::from_secs(5));
        gateway.register("hang", Arc::new(Hang));
        let err = gateway.complete("hang", "hi").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_zero_timeout_disables_bound() {
        let gateway = CompletionGateway::new().with_timeout(Duration::ZERO);
        assert!(gateway.timeout.is_none());
    }

    #[test]
    fn test_duplicate_engine_ids_rejected() {
        let configs = vec![
            EngineConfig::new("a", crate::LlmProvider::OpenAi, "gpt-4o"),
            EngineConfig::new("a", crate::LlmProvider::Claude, "claude"),
        ];
        assert!(matches!(
            CompletionGateway::from_configs(configs),
            Err(CouncilError::Config(_))
        ));
    }
}
