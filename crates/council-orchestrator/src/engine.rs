use crate::broadcast::{EventBroadcaster, Subscription};
use crate::config::OrchestratorConfig;
use crate::council::CouncilSynthesizer;
use crate::knowledge::{build_context, KnowledgeCache};
use crate::lifecycle::TaskManager;
use crate::prompts::agent_prompt;
use crate::registry::AgentRegistry;
use crate::roster::default_roster;
use crate::router::Router;
use crate::store::RegistryStore;
use council_agent::CompletionGateway;
use council_core::{
    Agent, Assignment, CouncilError, CouncilResult, LogEntry, LogLevel, Task, TaskKind,
    TaskOutput,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

/// Everything a background execution unit needs.
struct Shared {
    registry: Arc<AgentRegistry>,
    gateway: Arc<CompletionGateway>,
    tasks: TaskManager,
    router: Router,
    council: CouncilSynthesizer,
    config: OrchestratorConfig,
}

/// The orchestration facade.
///
/// Intake is synchronous: [`Orchestrator::create_task`] records and
/// broadcasts the task, then hands execution to a tracked background unit.
pub struct Orchestrator {
    shared: Arc<Shared>,
    running: Mutex<JoinSet<()>>,
}

impl Orchestrator {
    /// Wires the pipeline around an already loaded registry. The gateway's
    /// timeout is used as configured.
    pub fn new(
        registry: Arc<AgentRegistry>,
        gateway: Arc<CompletionGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        let events = registry.events().clone();
        let tasks = TaskManager::new(events.clone(), config.title_max_chars);
        let router = Router::new(gateway.clone(), config.orchestrator_agent.clone());
        let council =
            CouncilSynthesizer::new(gateway.clone(), registry.cache().clone(), events);

        Self {
            shared: Arc::new(Shared {
                registry,
                gateway,
                tasks,
                router,
                council,
                config,
            }),
            running: Mutex::new(JoinSet::new()),
        }
    }

    /// Loads (or seeds) the registry from `store` and applies the configured
    /// completion timeout to `gateway`.
    pub async fn load(
        store: Arc<dyn RegistryStore>,
        gateway: CompletionGateway,
        config: OrchestratorConfig,
    ) -> CouncilResult<Self> {
        let gateway =
            gateway.with_timeout(Duration::from_secs(config.completion_timeout_secs));
        let seed = default_roster(
            &config.default_engine,
            &config.orchestrator_agent,
            &gateway.engines(),
        );
        let registry = AgentRegistry::load(
            store,
            seed,
            Arc::new(KnowledgeCache::new(config.knowledge_max_chars)),
            EventBroadcaster::new(),
        )
        .await?;
        Ok(Self::new(Arc::new(registry), Arc::new(gateway), config))
    }

    /// Records a queued task and starts executing it in the background.
    /// Returns immediately with the queued task.
    pub fn create_task(&self, prompt: &str, kind: TaskKind) -> Task {
        let task = self.shared.tasks.create(prompt, kind);
        let mut running = self.running.lock();
        while running.try_join_next().is_some() {}
        running.spawn(drive(self.shared.clone(), task.id));
        task
    }

    /// Waits until every background unit spawned so far has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.running.lock());
            if batch.is_empty() {
                return;
            }
            while batch.join_next().await.is_some() {}
        }
    }

    pub fn list_agents(&self) -> Vec<Agent> {
        self.shared.registry.list_agents()
    }

    pub fn get_agent(&self, name: &str) -> Option<Agent> {
        self.shared.registry.get(name)
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.shared.tasks.list()
    }

    pub fn get_task(&self, id: Uuid) -> Option<Task> {
        self.shared.tasks.get(id)
    }

    pub async fn update_engine(&self, name: &str, engine: &str) -> CouncilResult<Agent> {
        self.shared.registry.update_engine(name, engine).await
    }

    pub async fn update_specialties(
        &self,
        name: &str,
        primary: &str,
        secondaries: Vec<String>,
    ) -> CouncilResult<Agent> {
        self.shared
            .registry
            .update_specialties(name, primary, secondaries)
            .await
    }

    pub async fn attach_knowledge(
        &self,
        name: &str,
        display_name: &str,
        source_path: &str,
        content: &str,
    ) -> CouncilResult<Agent> {
        self.shared
            .registry
            .attach_knowledge(name, display_name, source_path, content)
            .await
    }

    /// Registers an observer. Its first event is a snapshot of every agent
    /// and task.
    pub fn subscribe(&self) -> Subscription {
        let shared = &self.shared;
        shared
            .registry
            .with_agents(|agents| shared.tasks.subscribe(agents.to_vec()))
    }

    pub fn unsubscribe(&self, id: Uuid) -> bool {
        self.shared.registry.events().unsubscribe(id)
    }

    /// Engine ids known to the completion gateway.
    pub fn engines(&self) -> Vec<String> {
        self.shared.gateway.engines()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }
}

/// Runs one task to a terminal state. Execution happens in a nested spawn so
/// a panic still fails the task.
async fn drive(shared: Arc<Shared>, task_id: Uuid) {
    let worker = shared.clone();
    let outcome = match tokio::spawn(async move { worker.execute(task_id).await }).await {
        Ok(result) => result,
        Err(e) => Err(CouncilError::Execution(e.to_string())),
    };

    let settled = match outcome {
        Ok(output) => shared.tasks.complete(task_id, output),
        Err(e) => shared.tasks.fail(task_id, &e.to_string()),
    };
    if let Err(e) = settled {
        error!(task_id = %task_id, error = %e, "Could not settle task");
    }
}

impl Shared {
    /// Engine for routing and synthesis: the orchestrator agent's engine,
    /// or the configured default when that agent is absent.
    fn routing_engine(&self) -> String {
        self.registry
            .get(&self.config.orchestrator_agent)
            .map(|a| a.current_engine)
            .unwrap_or_else(|| self.config.default_engine.clone())
    }

    fn candidates(&self) -> Vec<Agent> {
        self.registry
            .list_agents()
            .into_iter()
            .filter(|a| a.name != self.config.orchestrator_agent)
            .collect()
    }

    fn agent(&self, name: &str) -> CouncilResult<Agent> {
        self.registry
            .get(name)
            .ok_or_else(|| CouncilError::NotFound(name.to_string()))
    }

    fn log(&self, task_id: Uuid, message: String) {
        self.registry
            .events()
            .log(LogEntry::new(LogLevel::Info, message).for_task(task_id));
    }

    async fn execute(&self, task_id: Uuid) -> CouncilResult<TaskOutput> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or(CouncilError::TaskNotFound(task_id))?;
        let engine = self.routing_engine();
        let candidates = self.candidates();

        match task.kind {
            TaskKind::Single => {
                let name = self
                    .router
                    .select_agent(&engine, &task.prompt, &candidates)
                    .await?;
                let agent = self.agent(&name)?;
                self.tasks.start(task_id, Assignment::Single(name.clone()))?;
                self.log(task_id, format!("Task '{}' assigned to {name}", task.title));

                let context = build_context(&agent, self.registry.cache());
                let answer = self
                    .gateway
                    .complete(
                        &agent.current_engine,
                        &agent_prompt(&agent, &context, &task.prompt),
                    )
                    .await?;
                info!(task_id = %task_id, agent = %name, "Agent answered");
                Ok(TaskOutput::text(answer))
            }
            TaskKind::Council => {
                let names = self
                    .router
                    .select_council(&engine, &task.prompt, &candidates)
                    .await?;
                let members = names
                    .iter()
                    .map(|name| self.agent(name))
                    .collect::<CouncilResult<Vec<_>>>()?;
                self.tasks
                    .start(task_id, Assignment::Council(names.clone()))?;
                self.log(
                    task_id,
                    format!("Task '{}' convened council: {}", task.title, names.join(", ")),
                );

                let outcome = self
                    .council
                    .run(task_id, &task.prompt, members, &engine)
                    .await?;
                Ok(TaskOutput::council(outcome.answer, outcome.transcript))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::JsonFileRegistryStore;
    use async_trait::async_trait;
    use council_agent::CompletionBackend;
    use council_core::{Event, OutputKind, TaskStatus};

    struct Fixed(&'static str);

    #[async_trait]
    impl CompletionBackend for Fixed {
        async fn complete(&self, _prompt: &str) -> CouncilResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct Panics;

    #[async_trait]
    impl CompletionBackend for Panics {
        async fn complete(&self, _prompt: &str) -> CouncilResult<String> {
            panic!("backend bug")
        }
    }

    async fn orchestrator(
        dir: &std::path::Path,
        router_reply: &'static str,
        worker: Arc<dyn CompletionBackend>,
    ) -> Orchestrator {
        let mut gateway = CompletionGateway::new();
        gateway.register("meta", Arc::new(Fixed(router_reply)));
        gateway.register("work", worker);
        let store = Arc::new(JsonFileRegistryStore::new(dir.join("agents.json")));
        let orchestrator = Orchestrator::load(
            store,
            gateway,
            OrchestratorConfig {
                default_engine: "work".into(),
                ..OrchestratorConfig::default()
            },
        )
        .await
        .unwrap();
        orchestrator
            .update_engine("Orchestrator", "meta")
            .await
            .unwrap();
        orchestrator
    }

    #[tokio::test]
    async fn test_create_task_returns_queued() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path(), "Nova", Arc::new(Fixed("answer"))).await;
        let task = orch.create_task("write a tagline", TaskKind::Single);
        assert_eq!(task.status, TaskStatus::Queued);
        orch.wait_idle().await;

        let done = orch.get_task(task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(done.assigned_agent.as_deref(), Some("Nova"));
        assert_eq!(done.output.unwrap().kind, OutputKind::Text);
    }

    #[tokio::test]
    async fn test_panicking_execution_fails_task() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path(), "Forge", Arc::new(Panics)).await;
        let task = orch.create_task("fix the build", TaskKind::Single);
        orch.wait_idle().await;

        let failed = orch.get_task(task.id).unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.output.unwrap().content.starts_with("Execution error"));
    }

    #[tokio::test]
    async fn test_routing_engine_and_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path(), "Nova", Arc::new(Fixed("answer"))).await;
        assert_eq!(orch.shared.routing_engine(), "meta");
        assert!(orch
            .shared
            .candidates()
            .iter()
            .all(|a| a.name != "Orchestrator"));
        assert_eq!(orch.engines(), vec!["meta".to_string(), "work".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_idle_with_nothing_running() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path(), "Nova", Arc::new(Fixed("answer"))).await;
        orch.wait_idle().await;
        assert!(orch.list_tasks().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribers_never_miss_agent_updates() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = Arc::new(orchestrator(tmp.path(), "Nova", Arc::new(Fixed("answer"))).await);

        let writer = {
            let orch = orch.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    orch.update_specialties("Cypher", &format!("security-{i}"), vec![])
                        .await
                        .unwrap();
                }
            })
        };
        let mut subscriptions = Vec::new();
        while !writer.is_finished() {
            subscriptions.push(orch.subscribe());
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        subscriptions.push(orch.subscribe());

        let expected = orch.get_agent("Cypher").unwrap().primary_specialty;
        assert_eq!(expected, "security-49");
        for mut sub in subscriptions {
            let mut cypher = None;
            while let Some(event) = sub.try_recv() {
                match event {
                    Event::Snapshot(snapshot) => {
                        cypher = snapshot.agents.into_iter().find(|a| a.name == "Cypher");
                    }
                    Event::AgentUpdated(agent) if agent.name == "Cypher" => cypher = Some(agent),
                    _ => {}
                }
            }
            assert_eq!(cypher.unwrap().primary_specialty, expected);
        }
    }
}
