use super::{read_json, transport_error, CompletionBackend};
use crate::config::EngineConfig;
use async_trait::async_trait;
use council_core::{CouncilError, CouncilResult};

/// Claude (Anthropic) API backend.
pub struct ClaudeBackend {
    config: EngineConfig,
    api_key: String,
    http: reqwest::Client,
}

impl ClaudeBackend {
    pub fn new(config: EngineConfig) -> Self {
        let api_key = config.resolved_api_key();
        Self {
            config,
            api_key,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionBackend for ClaudeBackend {
    async fn complete(&self, prompt: &str) -> CouncilResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url());

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        if let Some(sys) = &self.config.system_prompt {
            body["system"] = serde_json::json!(sys);
        }

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let resp_body = read_json("Claude API", resp).await?;
        parse_claude_response(&resp_body)
    }
}

/// Concatenates the `text` blocks of a Messages API response.
pub fn parse_claude_response(body: &serde_json::Value) -> CouncilResult<String> {
    let blocks = body["content"].as_array().ok_or_else(|| {
        CouncilError::CompletionUnavailable(format!("Claude response has no content: {body}"))
    })?;

    let text: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();

    Ok(text)
}
