use async_trait::async_trait;
use council_core::{Agent, CouncilError, CouncilResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Load/save contract for the agent roster.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// The persisted roster, or `None` when nothing has been saved yet.
    async fn load(&self) -> CouncilResult<Option<Vec<Agent>>>;
    /// Overwrites the persisted roster with `agents`.
    async fn save(&self, agents: &[Agent]) -> CouncilResult<()>;
}

/// On-disk document shape: `{ "agents": [...] }`.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    agents: Vec<Agent>,
}

/// JSON file store. Every save rewrites the whole document through a
/// temporary file and a rename, so readers never see a partial write.
pub struct JsonFileRegistryStore {
    path: PathBuf,
}

impl JsonFileRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "agents.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RegistryStore for JsonFileRegistryStore {
    async fn load(&self) -> CouncilResult<Option<Vec<Agent>>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&self.path).await?;
        let doc: RegistryDocument = serde_json::from_str(&data).map_err(|e| {
            CouncilError::Config(format!(
                "Failed to parse registry '{}': {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(doc.agents))
    }

    async fn save(&self, agents: &[Agent]) -> CouncilResult<()> {
        let persist_err =
            |e: std::io::Error| CouncilError::Persistence(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
        }
        let json = serde_json::to_string_pretty(&RegistryDocument {
            agents: agents.to_vec(),
        })?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await.map_err(persist_err)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(persist_err)?;
        Ok(())
    }
}
