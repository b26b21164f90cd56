//! Completion gateway for the Council engine.
//!
//! Wraps hosted text-generation services behind one narrow call,
//! `complete(engine_id, prompt) -> text`. Each supported provider implements
//! [`CompletionBackend`]; the [`CompletionGateway`] looks backends up by
//! engine id and bounds every call with a timeout.
//!
//! # Main types
//!
//! - [`CompletionBackend`] — Trait implemented once per provider.
//! - [`CompletionGateway`] — Engine-id lookup table over backends.
//! - [`EngineConfig`] — Configuration of one engine entry.
//! - [`RetryingBackend`] — Backoff wrapper for transient provider errors.

/// Provider backends.
pub mod backends;
/// Engine configuration.
pub mod config;
/// Retry with exponential backoff.
pub mod failover;
/// Engine lookup and bounded completion calls.
pub mod gateway;

pub use backends::{build_backend, CompletionBackend};
pub use config::{EngineConfig, LlmProvider};
pub use failover::{RetryPolicy, RetryingBackend};
pub use gateway::CompletionGateway;
