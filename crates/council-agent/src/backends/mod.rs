pub mod claude;
pub mod openai;

use crate::config::{EngineConfig, LlmProvider};
use crate::failover::{HTTP_STATUS_PREFIX, TIMED_OUT_PREFIX};
use async_trait::async_trait;
use claude::ClaudeBackend;
use council_core::{CouncilError, CouncilResult};
use openai::OpenAiBackend;
use std::sync::Arc;

/// Trait for completion provider backends.
///
/// Each provider (Claude, OpenAI-compatible services) implements this trait
/// once; the gateway selects the implementation through its engine table, so
/// callers never branch on provider names.
///
/// Implementations report every failure as
/// [`CouncilError::CompletionUnavailable`](council_core::CouncilError::CompletionUnavailable).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generate a completion for a single user prompt.
    async fn complete(&self, prompt: &str) -> CouncilResult<String>;
}

/// Builds the provider backend for one engine entry. Retries are layered on
/// by the gateway, which keeps this backend for single-attempt calls.
pub fn build_backend(config: EngineConfig) -> Arc<dyn CompletionBackend> {
    match config.provider {
        LlmProvider::Claude => Arc::new(ClaudeBackend::new(config)),
        LlmProvider::OpenAi
        | LlmProvider::OpenRouter
        | LlmProvider::Groq
        | LlmProvider::Ollama => Arc::new(OpenAiBackend::new(config)),
    }
}

/// Error for a non-success HTTP response. The message always starts with
/// `HTTP <status>` so retry classification never looks at the body.
pub(crate) fn status_error(
    provider: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> CouncilError {
    CouncilError::CompletionUnavailable(format!(
        "{HTTP_STATUS_PREFIX}{} from {provider}: {body}",
        status.as_u16()
    ))
}

/// Error for a request that never produced a response.
pub(crate) fn transport_error(e: reqwest::Error) -> CouncilError {
    if e.is_timeout() {
        CouncilError::CompletionUnavailable(format!("{TIMED_OUT_PREFIX}{e}"))
    } else {
        CouncilError::CompletionUnavailable(e.to_string())
    }
}

/// Reads the body of a response, failing on a non-success status before any
/// decoding is attempted.
pub(crate) async fn read_json(
    provider: &str,
    resp: reqwest::Response,
) -> CouncilResult<serde_json::Value> {
    let status = resp.status();
    let text = resp.text().await.map_err(transport_error)?;
    if !status.is_success() {
        return Err(status_error(provider, status, &text));
    }
    serde_json::from_str(&text).map_err(|e| {
        CouncilError::CompletionUnavailable(format!("{provider} returned invalid JSON: {e}"))
    })
}
