//! Core types and error definitions for the Council engine.
//!
//! This crate provides the foundational types shared across all Council crates:
//! the error taxonomy, the agent roster entities, the task record and its state
//! machine, and the events published to observers.
//!
//! # Main types
//!
//! - [`CouncilError`] — Unified error enum for all Council subsystems.
//! - [`CouncilResult`] — Convenience alias for `Result<T, CouncilError>`.
//! - [`Agent`] — A named specialist worker configuration.
//! - [`Task`] — One unit of requested work and its lifecycle record.
//! - [`Event`] — A state change published to observers.

/// Agent roster entities.
pub mod agent;
/// Observer events.
pub mod event;
/// Task record and status state machine.
pub mod task;

pub use agent::{Agent, KnowledgeBundle};
pub use event::{Event, LogEntry, LogLevel, Snapshot};
pub use task::{
    Assignment, CouncilContribution, OutputKind, Task, TaskKind, TaskOutput, TaskStatus,
};

// --- Error types ---

/// Top-level error type for the Council engine.
///
/// The first four variants form the taxonomy surfaced on failed tasks; the
/// rest cover configuration, transport and I/O concerns.
#[derive(Debug, thiserror::Error)]
pub enum CouncilError {
    /// An agent name unknown to the registry.
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// The router chose a name outside the candidate set, or the reserved
    /// orchestrator identity.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// A completion backend call failed, errored or timed out.
    #[error("Completion unavailable: {0}")]
    CompletionUnavailable(String),

    /// The agent registry could not be written.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// An engine outside the agent's permitted engine options.
    #[error("Engine '{engine}' is not an option for agent '{agent}'")]
    InvalidEngine {
        /// Agent whose engine was being changed.
        agent: String,
        /// Rejected engine id.
        engine: String,
    },

    /// A task status change the state machine does not allow.
    #[error("Invalid transition for task {task}: {from} -> {to}")]
    InvalidTransition {
        /// Task id.
        task: uuid::Uuid,
        /// Status the task was in.
        from: TaskStatus,
        /// Status that was requested.
        to: TaskStatus,
    },

    /// A task id unknown to the lifecycle manager.
    #[error("Task not found: {0}")]
    TaskNotFound(uuid::Uuid),

    /// Background execution ended abnormally (panic or abort).
    #[error("Execution error: {0}")]
    Execution(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the HTTP/WebSocket gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`CouncilError`].
pub type CouncilResult<T> = Result<T, CouncilError>;
