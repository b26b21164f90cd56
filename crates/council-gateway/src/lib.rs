//! HTTP and WebSocket surface for the Council orchestrator.
//!
//! REST routes expose the registry and task intake; `/ws` streams every
//! orchestrator event, starting with a snapshot, and accepts commands.

pub mod api;
pub mod connection;
pub mod inbound;
pub mod server;

pub use server::GatewayServer;
