use crate::broadcast::{EventBroadcaster, Subscription};
use council_core::{
    Agent, Assignment, CouncilError, CouncilResult, Event, LogEntry, LogLevel, Snapshot, Task,
    TaskKind, TaskOutput, TaskStatus,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Default)]
struct TaskTable {
    order: Vec<Uuid>,
    by_id: HashMap<Uuid, Task>,
}

/// Owns every task record and its state machine.
///
/// Each transition is published while the table lock is held, so observers
/// receive the updates of one task in the order they happened.
pub struct TaskManager {
    tasks: RwLock<TaskTable>,
    events: Arc<EventBroadcaster>,
    title_max_chars: usize,
}

impl TaskManager {
    pub fn new(events: Arc<EventBroadcaster>, title_max_chars: usize) -> Self {
        Self {
            tasks: RwLock::new(TaskTable::default()),
            events,
            title_max_chars,
        }
    }

    /// Inserts a queued task and broadcasts it.
    pub fn create(&self, prompt: &str, kind: TaskKind) -> Task {
        let task = Task::new(prompt, kind, self.title_max_chars);
        let mut table = self.tasks.write();
        table.order.push(task.id);
        table.by_id.insert(task.id, task.clone());
        info!(task_id = %task.id, kind = %task.kind, title = %task.title, "Task queued");
        self.events.publish(Event::TaskUpdated(task.clone()));
        task
    }

    /// `queued -> running`, recording who the task was routed to.
    pub fn start(&self, id: Uuid, assignment: Assignment) -> CouncilResult<Task> {
        self.transition(id, |task| task.start(assignment))
    }

    /// `running -> done`.
    pub fn complete(&self, id: Uuid, output: TaskOutput) -> CouncilResult<Task> {
        self.transition(id, |task| task.complete(output))
    }

    /// `queued | running -> failed`, with `message` as the output.
    pub fn fail(&self, id: Uuid, message: &str) -> CouncilResult<Task> {
        self.transition(id, |task| task.fail(message))
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks.read().by_id.get(&id).cloned()
    }

    /// Every task in creation order.
    pub fn list(&self) -> Vec<Task> {
        let table = self.tasks.read();
        table
            .order
            .iter()
            .filter_map(|id| table.by_id.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().order.is_empty()
    }

    /// Registers an observer primed with `agents` and the current tasks.
    ///
    /// The table read lock is held across registration so no task update
    /// can slip between the snapshot and the first live event.
    pub fn subscribe(&self, agents: Vec<Agent>) -> Subscription {
        let table = self.tasks.read();
        let tasks = table
            .order
            .iter()
            .filter_map(|id| table.by_id.get(id).cloned())
            .collect();
        self.events.subscribe(Snapshot { agents, tasks })
    }

    /// Applies `f` to the stored task. On success the new state is broadcast;
    /// on error the task is left untouched.
    fn transition<F>(&self, id: Uuid, f: F) -> CouncilResult<Task>
    where
        F: FnOnce(&mut Task) -> CouncilResult<()>,
    {
        let mut table = self.tasks.write();
        let stored = table
            .by_id
            .get_mut(&id)
            .ok_or(CouncilError::TaskNotFound(id))?;

        let mut next = stored.clone();
        f(&mut next)?;
        *stored = next.clone();

        self.events.publish(Event::TaskUpdated(next.clone()));
        match next.status {
            TaskStatus::Running => {
                info!(task_id = %id, "Task running");
            }
            TaskStatus::Done => {
                info!(task_id = %id, "Task done");
                self.events.log(
                    LogEntry::new(LogLevel::Info, format!("Task '{}' completed", next.title))
                        .for_task(id),
                );
            }
            TaskStatus::Failed => {
                let reason = next.output.as_ref().map(|o| o.content.as_str()).unwrap_or("");
                error!(task_id = %id, reason = %reason, "Task failed");
                self.events.log(
                    LogEntry::new(
                        LogLevel::Error,
                        format!("Task '{}' failed: {reason}", next.title),
                    )
                    .for_task(id),
                );
            }
            TaskStatus::Queued => {}
        }
        Ok(next)
    }
}
