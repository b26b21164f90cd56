use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named reference to cached knowledge content.
///
/// The agent owns the reference; the bytes live in the process-wide content
/// cache keyed by `source_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBundle {
    /// Name shown to users and in the context block header.
    pub display_name: String,
    /// Cache key of the bundle content.
    pub source_path: String,
}

impl KnowledgeBundle {
    /// Creates a bundle reference.
    pub fn new(display_name: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            source_path: source_path.into(),
        }
    }
}

/// A specialist worker configuration. `name` is the stable key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique name; also the join key used by tasks.
    pub name: String,
    /// Main routing hint.
    pub primary_specialty: String,
    /// Additional routing hints, in display order.
    #[serde(default)]
    pub secondary_specialties: Vec<String>,
    /// Free text shown to the router as candidate metadata.
    #[serde(default)]
    pub description: String,
    /// Engine id currently assigned to this agent.
    pub current_engine: String,
    /// Legal values for `current_engine`; empty means unrestricted.
    #[serde(default)]
    pub engine_options: BTreeSet<String>,
    /// Attached knowledge, in attachment order.
    #[serde(default)]
    pub knowledge_bundles: Vec<KnowledgeBundle>,
}

impl Agent {
    /// Creates an agent with no secondary specialties, engine options or knowledge.
    pub fn new(
        name: impl Into<String>,
        primary_specialty: impl Into<String>,
        current_engine: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            primary_specialty: primary_specialty.into(),
            secondary_specialties: Vec::new(),
            description: String::new(),
            current_engine: current_engine.into(),
            engine_options: BTreeSet::new(),
            knowledge_bundles: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the secondary specialties.
    pub fn with_secondary(mut self, secondaries: Vec<String>) -> Self {
        self.secondary_specialties = secondaries;
        self
    }

    /// Sets the engine options. The current engine is added when missing so
    /// the agent stays valid.
    pub fn with_engine_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engine_options = options.into_iter().map(Into::into).collect();
        if !self.engine_options.is_empty() {
            self.engine_options.insert(self.current_engine.clone());
        }
        self
    }

    /// Whether `engine` may be assigned to this agent.
    pub fn allows_engine(&self, engine: &str) -> bool {
        self.engine_options.is_empty() || self.engine_options.contains(engine)
    }

    /// Whether the current engine satisfies the engine-options invariant.
    pub fn engine_is_valid(&self) -> bool {
        self.allows_engine(&self.current_engine)
    }

    /// Adds a knowledge reference, or renames the existing one for the same
    /// source path so re-attaching is idempotent.
    pub fn attach_bundle(&mut self, bundle: KnowledgeBundle) {
        match self
            .knowledge_bundles
            .iter_mut()
            .find(|b| b.source_path == bundle.source_path)
        {
            Some(existing) => existing.display_name = bundle.display_name,
            None => self.knowledge_bundles.push(bundle),
        }
    }
}
