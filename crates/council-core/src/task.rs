use crate::{CouncilError, CouncilResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default maximum length (in characters) of a derived task title.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 60;

/// Execution mode requested for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// One routed agent answers.
    Single,
    /// Several routed agents answer and their answers are synthesized.
    Council,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Single => write!(f, "single"),
            TaskKind::Council => write!(f, "council"),
        }
    }
}

/// Status of a task. Forward-only: `queued -> running -> done | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, not yet routed.
    Queued,
    /// Routed, executing.
    Running,
    /// Finished with an answer.
    Done,
    /// Finished with an error message.
    Failed,
}

impl TaskStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Kind of content carried by a task output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Plain text answer (also used for failure messages).
    Text,
    /// Reference to a generated image.
    Image,
    /// Synthesized council answer with transcript.
    Council,
}

/// One council member's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilContribution {
    /// Member that produced the response.
    pub agent_name: String,
    /// The member's answer, or an error note when `degraded`.
    pub response: String,
    /// Set when the member's completion failed.
    #[serde(default)]
    pub degraded: bool,
}

impl CouncilContribution {
    /// A successful member answer.
    pub fn answered(agent_name: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            response: response.into(),
            degraded: false,
        }
    }

    /// A member failure folded into an error note.
    pub fn degraded(agent_name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        let agent_name = agent_name.into();
        let response = format!("[{agent_name} could not respond: {error}]");
        Self {
            agent_name,
            response,
            degraded: true,
        }
    }
}

/// The result recorded on a task when it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Content kind.
    pub kind: OutputKind,
    /// Answer text, or the error message of a failed task.
    pub content: String,
    /// Per-member answers, in call order (council tasks that finished only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub council_transcript: Option<Vec<CouncilContribution>>,
}

impl TaskOutput {
    /// A plain text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Text,
            content: content.into(),
            council_transcript: None,
        }
    }

    /// A synthesized council answer with its transcript.
    pub fn council(content: impl Into<String>, transcript: Vec<CouncilContribution>) -> Self {
        Self {
            kind: OutputKind::Council,
            content: content.into(),
            council_transcript: Some(transcript),
        }
    }
}

/// Who a task was routed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "agents", rename_all = "lowercase")]
pub enum Assignment {
    /// A single agent.
    Single(String),
    /// A council of agents, in call order.
    Council(Vec<String>),
}

/// A unit of requested work and its lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque id, never reused.
    pub id: Uuid,
    /// The original request text.
    pub prompt: String,
    /// Requested execution mode.
    pub kind: TaskKind,
    /// Display title derived from the prompt.
    pub title: String,
    /// Current status.
    pub status: TaskStatus,
    /// Routed agent (single mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    /// Routed members (council mode).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub council_members: Vec<String>,
    /// Present iff the task is terminal.
    #[serde(default)]
    pub output: Option<TaskOutput>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on entering `done` or `failed`.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a queued task with a title derived from the prompt.
    pub fn new(prompt: impl Into<String>, kind: TaskKind, title_max_chars: usize) -> Self {
        let prompt = prompt.into();
        Self {
            id: Uuid::new_v4(),
            title: derive_title(&prompt, title_max_chars),
            prompt,
            kind,
            status: TaskStatus::Queued,
            assigned_agent: None,
            council_members: Vec::new(),
            output: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn transition_error(&self, to: TaskStatus) -> CouncilError {
        CouncilError::InvalidTransition {
            task: self.id,
            from: self.status,
            to,
        }
    }

    /// `queued -> running`, recording the assignment.
    pub fn start(&mut self, assignment: Assignment) -> CouncilResult<()> {
        if self.status != TaskStatus::Queued {
            return Err(self.transition_error(TaskStatus::Running));
        }
        match assignment {
            Assignment::Single(name) => self.assigned_agent = Some(name),
            Assignment::Council(members) => self.council_members = members,
        }
        self.status = TaskStatus::Running;
        Ok(())
    }

    /// `running -> done`.
    ///
    /// Transcripts are kept only on council tasks; a council task always ends
    /// up with one, even when empty.
    pub fn complete(&mut self, mut output: TaskOutput) -> CouncilResult<()> {
        if self.status != TaskStatus::Running {
            return Err(self.transition_error(TaskStatus::Done));
        }
        match self.kind {
            TaskKind::Single => output.council_transcript = None,
            TaskKind::Council => {
                output.council_transcript.get_or_insert_with(Vec::new);
            }
        }
        self.finish(TaskStatus::Done, output);
        Ok(())
    }

    /// `queued | running -> failed`, with the message as text output.
    pub fn fail(&mut self, message: impl Into<String>) -> CouncilResult<()> {
        if self.status.is_terminal() {
            return Err(self.transition_error(TaskStatus::Failed));
        }
        self.finish(TaskStatus::Failed, TaskOutput::text(message));
        Ok(())
    }

    fn finish(&mut self, status: TaskStatus, output: TaskOutput) {
        self.status = status;
        self.output = Some(output);
        self.completed_at = Some(Utc::now());
    }
}

/// Collapses whitespace and truncates to `max_chars`, appending an ellipsis
/// when something was cut.
pub fn derive_title(prompt: &str, max_chars: usize) -> String {
    let collapsed = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut title: String = collapsed.chars().take(max_chars).collect();
    title.truncate(title.trim_end().len());
    title.push_str("...");
    title
}
