use crate::connection::ConnectionManager;
use council_core::{CouncilResult, TaskKind};
use council_orchestrator::Orchestrator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A command sent by a WebSocket client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Submit a new request.
    CreateTask {
        prompt: String,
        #[serde(default)]
        council: bool,
    },
    /// Switch an agent's engine.
    UpdateEngine { agent: String, engine: String },
}

/// A reply addressed to the sending connection only. State changes are
/// reported through the event stream, not here.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Reply {
    /// The task was accepted and queued.
    TaskAccepted { task_id: Uuid },
    /// The command was rejected.
    Error { message: String },
}

/// Applies inbound commands to the orchestrator.
pub struct CommandHandler {
    orchestrator: Arc<Orchestrator>,
    connections: Arc<ConnectionManager>,
}

impl CommandHandler {
    pub fn new(orchestrator: Arc<Orchestrator>, connections: Arc<ConnectionManager>) -> Self {
        Self {
            orchestrator,
            connections,
        }
    }

    /// Parses and applies one raw text frame, replying to `connection_id`.
    pub async fn handle_text(&self, text: &str, connection_id: Uuid) -> CouncilResult<()> {
        let reply = match serde_json::from_str::<InboundMessage>(text) {
            Ok(msg) => self.apply(msg, connection_id).await,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Unparseable message");
                Some(Reply::Error {
                    message: format!("invalid message: {e}"),
                })
            }
        };
        if let Some(reply) = reply {
            let json = serde_json::to_string(&reply)?;
            self.connections.send_to(connection_id, &json).await;
        }
        Ok(())
    }

    async fn apply(&self, msg: InboundMessage, connection_id: Uuid) -> Option<Reply> {
        match msg {
            InboundMessage::CreateTask { prompt, council } => {
                if prompt.trim().is_empty() {
                    return Some(Reply::Error {
                        message: "prompt must not be empty".to_string(),
                    });
                }
                let kind = if council {
                    TaskKind::Council
                } else {
                    TaskKind::Single
                };
                let task = self.orchestrator.create_task(&prompt, kind);
                info!(
                    connection_id = %connection_id,
                    task_id = %task.id,
                    "Task submitted over WebSocket"
                );
                Some(Reply::TaskAccepted { task_id: task.id })
            }
            InboundMessage::UpdateEngine { agent, engine } => {
                match self.orchestrator.update_engine(&agent, &engine).await {
                    // The agent-updated event already reaches this client.
                    Ok(_) => None,
                    Err(e) => Some(Reply::Error {
                        message: e.to_string(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_task() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type":"create_task","prompt":"hi","council":true}"#)
                .unwrap();
        assert!(matches!(
            msg,
            InboundMessage::CreateTask { ref prompt, council: true } if prompt == "hi"
        ));

        let msg: InboundMessage =
            serde_json::from_str(r#"{"type":"create_task","prompt":"hi"}"#).unwrap();
        assert!(matches!(msg, InboundMessage::CreateTask { council: false, .. }));
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        assert!(serde_json::from_str::<InboundMessage>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn test_reply_shape() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(Reply::TaskAccepted { task_id: id }).unwrap();
        assert_eq!(json["type"], "task-accepted");
        assert_eq!(json["task_id"], id.to_string());
        let json = serde_json::to_value(Reply::Error {
            message: "bad".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
    }
}
