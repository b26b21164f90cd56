use super::{read_json, transport_error, CompletionBackend};
use crate::config::{EngineConfig, LlmProvider};
use async_trait::async_trait;
use council_core::{CouncilError, CouncilResult};

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any other provider
/// that implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    config: EngineConfig,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: EngineConfig) -> Self {
        let api_key = config.resolved_api_key();
        Self {
            config,
            api_key,
            http: reqwest::Client::new(),
        }
    }

    fn build_body(&self, prompt: &str) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(sys) = &self.config.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": sys }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": messages,
        })
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        let request = if self.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        };

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "Council")
        } else {
            request
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, prompt: &str) -> CouncilResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let request = self.add_provider_headers(self.http.post(&url));

        let resp = request
            .json(&self.build_body(prompt))
            .send()
            .await
            .map_err(transport_error)?;

        let resp_body = read_json("OpenAI API", resp).await?;
        parse_openai_response(&resp_body)
    }
}

pub fn parse_openai_response(body: &serde_json::Value) -> CouncilResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            CouncilError::CompletionUnavailable(format!(
                "OpenAI response has no message content: {body}"
            ))
        })
}
