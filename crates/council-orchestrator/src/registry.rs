use crate::broadcast::EventBroadcaster;
use crate::knowledge::KnowledgeCache;
use crate::store::RegistryStore;
use council_core::{
    Agent, CouncilError, CouncilResult, Event, KnowledgeBundle, LogEntry, LogLevel,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The agent roster.
///
/// Reads go straight to the committed list. Mutations of one agent are
/// linearized by that agent's mutex; different agents proceed concurrently.
/// Agents are never added or removed after load, so the lock map is fixed.
pub struct AgentRegistry {
    agents: RwLock<Vec<Agent>>,
    locks: HashMap<String, Arc<Mutex<()>>>,
    save_lock: Mutex<()>,
    store: Arc<dyn RegistryStore>,
    cache: Arc<KnowledgeCache>,
    events: Arc<EventBroadcaster>,
}

impl AgentRegistry {
    /// Loads the roster from `store`, seeding and saving `seed` when nothing
    /// has been persisted yet.
    pub async fn load(
        store: Arc<dyn RegistryStore>,
        seed: Vec<Agent>,
        cache: Arc<KnowledgeCache>,
        events: Arc<EventBroadcaster>,
    ) -> CouncilResult<Self> {
        let (agents, seeded) = match store.load().await? {
            Some(agents) => (agents, false),
            None => (seed, true),
        };
        let registry = Self::from_agents(agents, store, cache, events)?;
        if seeded {
            info!(count = registry.len(), "Seeding default agent roster");
            registry.persist().await;
        } else {
            info!(count = registry.len(), "Agent registry loaded");
        }
        Ok(registry)
    }

    /// Builds a registry from an in-memory roster.
    ///
    /// Duplicate names are rejected. An agent whose engine is outside its
    /// options is moved to the first option.
    pub fn from_agents(
        mut agents: Vec<Agent>,
        store: Arc<dyn RegistryStore>,
        cache: Arc<KnowledgeCache>,
        events: Arc<EventBroadcaster>,
    ) -> CouncilResult<Self> {
        let mut seen = HashSet::new();
        for agent in &mut agents {
            if !seen.insert(agent.name.clone()) {
                return Err(CouncilError::Config(format!(
                    "duplicate agent name '{}' in registry",
                    agent.name
                )));
            }
            if !agent.engine_is_valid() {
                if let Some(first) = agent.engine_options.iter().next().cloned() {
                    warn!(
                        agent = %agent.name,
                        engine = %agent.current_engine,
                        replacement = %first,
                        "Engine not among options, normalizing"
                    );
                    agent.current_engine = first;
                }
            }
        }

        let locks = agents
            .iter()
            .map(|a| (a.name.clone(), Arc::new(Mutex::new(()))))
            .collect();

        Ok(Self {
            agents: RwLock::new(agents),
            locks,
            save_lock: Mutex::new(()),
            store,
            cache,
            events,
        })
    }

    /// Snapshot of every agent in load order.
    pub fn list_agents(&self) -> Vec<Agent> {
        self.agents.read().clone()
    }

    /// Runs `f` on the committed roster while holding the lock agent updates
    /// are published under.
    pub fn with_agents<R>(&self, f: impl FnOnce(&[Agent]) -> R) -> R {
        let agents = self.agents.read();
        f(&agents)
    }

    pub fn get(&self, name: &str) -> Option<Agent> {
        self.agents.read().iter().find(|a| a.name == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.locks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    pub fn cache(&self) -> &Arc<KnowledgeCache> {
        &self.cache
    }

    pub fn events(&self) -> &Arc<EventBroadcaster> {
        &self.events
    }

    /// Switches the agent's engine. Rejects engines outside a non-empty
    /// option set.
    pub async fn update_engine(&self, name: &str, engine: &str) -> CouncilResult<Agent> {
        self.mutate(name, |agent| {
            if !agent.allows_engine(engine) {
                return Err(CouncilError::InvalidEngine {
                    agent: agent.name.clone(),
                    engine: engine.to_string(),
                });
            }
            agent.current_engine = engine.to_string();
            Ok(())
        })
        .await
    }

    /// Replaces the agent's routing hints.
    pub async fn update_specialties(
        &self,
        name: &str,
        primary: &str,
        secondaries: Vec<String>,
    ) -> CouncilResult<Agent> {
        self.mutate(name, |agent| {
            agent.primary_specialty = primary.to_string();
            agent.secondary_specialties = secondaries;
            Ok(())
        })
        .await
    }

    /// Caches `content` under `source_path` and attaches it to the agent.
    /// Re-attaching the same path only refreshes the display name and content.
    pub async fn attach_knowledge(
        &self,
        name: &str,
        display_name: &str,
        source_path: &str,
        content: &str,
    ) -> CouncilResult<Agent> {
        self.mutate(name, |agent| {
            let kept = self.cache.insert(source_path, content);
            info!(agent = %agent.name, source = %source_path, chars = kept, "Knowledge attached");
            agent.attach_bundle(KnowledgeBundle::new(display_name, source_path));
            Ok(())
        })
        .await
    }

    /// Runs `f` on a copy of the agent under its mutex, then commits,
    /// persists and broadcasts the result.
    async fn mutate<F>(&self, name: &str, f: F) -> CouncilResult<Agent>
    where
        F: FnOnce(&mut Agent) -> CouncilResult<()>,
    {
        let lock = self
            .locks
            .get(name)
            .ok_or_else(|| CouncilError::NotFound(name.to_string()))?;
        let _guard = lock.lock().await;

        let mut agent = self
            .get(name)
            .ok_or_else(|| CouncilError::NotFound(name.to_string()))?;
        f(&mut agent)?;

        {
            let mut agents = self.agents.write();
            if let Some(slot) = agents.iter_mut().find(|a| a.name == name) {
                *slot = agent.clone();
            }
        }

        self.persist().await;
        {
            // Ordered against `with_agents`, so a new observer either sees
            // this agent in its snapshot or receives this event.
            let _roster = self.agents.read();
            self.events.publish(Event::AgentUpdated(agent.clone()));
        }
        Ok(agent)
    }

    /// Writes the latest committed roster. Failures are reported but never
    /// undo the in-memory change.
    async fn persist(&self) {
        let _save = self.save_lock.lock().await;
        let snapshot = self.list_agents();
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "Failed to persist agent registry");
            self.events.log(LogEntry::new(
                LogLevel::Warn,
                format!("Failed to persist agent registry: {e}"),
            ));
        }
    }
}
