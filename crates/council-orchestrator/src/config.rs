use serde::{Deserialize, Serialize};

/// Settings for the orchestration pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Name of the reserved routing agent. It is never a routing candidate.
    #[serde(default = "default_orchestrator_agent")]
    pub orchestrator_agent: String,
    /// Engine used for routing and synthesis when the orchestrator agent is
    /// absent from the registry; also the engine of seeded agents.
    #[serde(default = "default_engine")]
    pub default_engine: String,
    /// Bound on a single completion call in seconds; `0` disables it.
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
    /// Knowledge content is truncated to this many characters on ingestion.
    #[serde(default = "default_knowledge_max_chars")]
    pub knowledge_max_chars: usize,
    /// Maximum length of a derived task title.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
}

fn default_orchestrator_agent() -> String {
    "Orchestrator".to_string()
}
fn default_engine() -> String {
    "default".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    300
}
fn default_knowledge_max_chars() -> usize {
    20_000
}
fn default_title_max_chars() -> usize {
    council_core::task::DEFAULT_TITLE_MAX_CHARS
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            orchestrator_agent: default_orchestrator_agent(),
            default_engine: default_engine(),
            completion_timeout_secs: default_completion_timeout_secs(),
            knowledge_max_chars: default_knowledge_max_chars(),
            title_max_chars: default_title_max_chars(),
        }
    }
}
