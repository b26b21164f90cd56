use council_agent::EngineConfig;
use council_orchestrator::OrchestratorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level `council.toml`.
#[derive(Debug, Deserialize)]
pub struct CouncilConfig {
    /// Agent registry file. Relative paths resolve against the config file's
    /// directory.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engines: Vec<EngineConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("./data/agents.json")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

impl CouncilConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the config file.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::from_toml(&text)
    }

    /// The registry path, resolved against `config_dir` when relative.
    pub fn registry_path_in(&self, config_dir: &Path) -> PathBuf {
        if self.registry_path.is_absolute() {
            self.registry_path.clone()
        } else {
            config_dir.join(&self.registry_path)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use council_agent::LlmProvider;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CouncilConfig::from_toml("").unwrap();
        assert_eq!(config.registry_path, PathBuf::from("./data/agents.json"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.orchestrator.orchestrator_agent, "Orchestrator");
        assert!(config.engines.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = CouncilConfig::from_toml(
            r#"
registry_path = "/var/lib/council/agents.json"

[orchestrator]
default_engine = "sonnet"
completion_timeout_secs = 0

[server]
port = 8080

[[engines]]
id = "sonnet"
provider = "claude"
model_id = "claude-sonnet-4-20250514"
api_key_env = "ANTHROPIC_API_KEY"

[[engines]]
id = "local"
provider = "ollama"
model_id = "llama3"

[engines.retry_policy]
max_retries = 2
"#,
        )
        .unwrap();
        assert_eq!(config.orchestrator.default_engine, "sonnet");
        assert_eq!(config.orchestrator.completion_timeout_secs, 0);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engines.len(), 2);
        assert_eq!(config.engines[0].provider, LlmProvider::Claude);
        assert_eq!(config.engines[1].retry_policy.as_ref().unwrap().max_retries, 2);
        assert_eq!(
            config.registry_path_in(Path::new("/etc/council")),
            PathBuf::from("/var/lib/council/agents.json")
        );
    }

    #[test]
    fn test_relative_registry_path() {
        let config = CouncilConfig::from_toml("registry_path = \"agents.json\"").unwrap();
        assert_eq!(
            config.registry_path_in(Path::new("/etc/council")),
            PathBuf::from("/etc/council/agents.json")
        );
    }

    #[test]
    fn test_sample_config_parses() {
        let config = CouncilConfig::from_toml(include_str!("../../../council.toml")).unwrap();
        assert_eq!(config.engines.len(), 3);
        assert_eq!(config.orchestrator.default_engine, "sonnet");
        assert!(config.engines[0].retry_policy.is_some());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CouncilConfig::load(&tmp.path().join("nope.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
