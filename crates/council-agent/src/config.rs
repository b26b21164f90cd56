use crate::failover::RetryPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Claude,
    OpenAi,
    OpenRouter,
    /// Groq cloud inference — OpenAI-compatible API.
    Groq,
    /// Local Ollama server through its OpenAI-compatible endpoint. No key needed.
    Ollama,
}

/// One entry of the engine table: the id agents refer to plus the provider
/// settings used to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine id stored in `Agent::current_engine`.
    pub id: String,
    pub provider: LlmProvider,
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    /// Environment variable read when `api_key` is empty.
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional system prompt sent with every completion on this engine.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl EngineConfig {
    /// Minimal config for `provider`/`model_id`, registered under `id`.
    pub fn new(id: impl Into<String>, provider: LlmProvider, model_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            model_id: model_id.into(),
            api_key: String::new(),
            api_key_env: None,
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            retry_policy: None,
        }
    }

    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::Ollama => "http://localhost:11434",
            }
        }
    }

    /// The literal `api_key`, or the value of `api_key_env` when the literal is empty.
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }
}
