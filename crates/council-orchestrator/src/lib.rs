//! Task orchestration and council engine.
//!
//! Accepts free-form requests, routes each one to a specialist agent (or a
//! council of agents) through a meta-completion, executes it on the agent's
//! completion engine and publishes every state change to observers.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Facade owning the whole pipeline; task intake entry point.
//! - [`AgentRegistry`] — Roster of agents with per-agent serialized, persisted mutations.
//! - [`Router`] — Chooses agents for a request via the completion backend.
//! - [`TaskManager`] — Owns the task state machine.
//! - [`CouncilSynthesizer`] — Fans a request out to council members and merges their answers.
//! - [`EventBroadcaster`] — Fans events out to subscribed observers.

/// Observer registry and event fan-out.
pub mod broadcast;
/// Orchestrator settings.
pub mod config;
/// Council fan-out and synthesis.
pub mod council;
/// Orchestrator facade and background execution.
pub mod engine;
/// Knowledge content cache and context assembly.
pub mod knowledge;
/// Task lifecycle manager.
pub mod lifecycle;
/// Prompt templates.
pub mod prompts;
/// Agent registry.
pub mod registry;
/// Default agent roster.
pub mod roster;
/// Agent routing.
pub mod router;
/// Registry persistence.
pub mod store;

pub use broadcast::{EventBroadcaster, Subscription};
pub use config::OrchestratorConfig;
pub use council::{CouncilOutcome, CouncilSynthesizer};
pub use engine::Orchestrator;
pub use knowledge::{build_context, KnowledgeCache};
pub use lifecycle::TaskManager;
pub use registry::AgentRegistry;
pub use roster::default_roster;
pub use router::Router;
pub use store::{JsonFileRegistryStore, RegistryStore};
