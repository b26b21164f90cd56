use crate::agent::Agent;
use crate::task::{CouncilContribution, Task};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Normal progress.
    Info,
    /// Something degraded but work continued.
    Warn,
    /// A task failed.
    Error,
}

/// A human-readable log line published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Related task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    /// When the line was produced.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Creates a log line stamped now.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            task_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches the related task id.
    pub fn for_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

/// Full state sent to a new observer before any incremental event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Every agent, in registry order.
    pub agents: Vec<Agent>,
    /// Every task, in creation order.
    pub tasks: Vec<Task>,
}

/// A state change published to observers.
///
/// Serialized as `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Event {
    /// Priming state for a newly registered observer.
    Snapshot(Snapshot),
    /// An agent's configuration changed.
    AgentUpdated(Agent),
    /// A task was created or changed status.
    TaskUpdated(Task),
    /// A council member answered (or failed to).
    CouncilContribution {
        /// Owning task.
        task_id: Uuid,
        /// The member's contribution.
        contribution: CouncilContribution,
    },
    /// A human-readable log line.
    Log(LogEntry),
}

impl Event {
    /// The wire name of this event type.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Snapshot(_) => "snapshot",
            Event::AgentUpdated(_) => "agent-updated",
            Event::TaskUpdated(_) => "task-updated",
            Event::CouncilContribution { .. } => "council-contribution",
            Event::Log(_) => "log",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = Event::Log(LogEntry::new(LogLevel::Info, "hello"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "log");
        assert_eq!(json["payload"]["message"], "hello");
        assert_eq!(json["payload"]["level"], "info");
        assert!(json["payload"].get("task_id").is_none());
    }

    #[test]
    fn test_kind_matches_serde_tag() {
        let events = vec![
            Event::Snapshot(Snapshot::default()),
            Event::AgentUpdated(Agent::new("Nova", "writing", "gpt-4o")),
            Event::CouncilContribution {
                task_id: Uuid::new_v4(),
                contribution: CouncilContribution::answered("Nova", "hi"),
            },
            Event::Log(LogEntry::new(LogLevel::Warn, "x")),
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.kind());
        }
    }
}
