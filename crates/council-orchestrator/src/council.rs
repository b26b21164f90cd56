use crate::broadcast::EventBroadcaster;
use crate::knowledge::{build_context, KnowledgeCache};
use crate::prompts::{council_member_prompt, synthesis_prompt};
use council_agent::CompletionGateway;
use council_core::{Agent, CouncilContribution, CouncilResult, Event};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of a council run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouncilOutcome {
    /// The synthesized answer.
    pub answer: String,
    /// Member contributions in call order.
    pub transcript: Vec<CouncilContribution>,
}

/// Fans a request out to several agents and merges their answers.
pub struct CouncilSynthesizer {
    gateway: Arc<CompletionGateway>,
    cache: Arc<KnowledgeCache>,
    events: Arc<EventBroadcaster>,
}

impl CouncilSynthesizer {
    pub fn new(
        gateway: Arc<CompletionGateway>,
        cache: Arc<KnowledgeCache>,
        events: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            gateway,
            cache,
            events,
        }
    }

    /// Queries every member concurrently, then asks `synthesis_engine` for
    /// one answer.
    ///
    /// A failing member degrades to an error note instead of failing the run.
    /// Only a synthesis failure is returned as an error.
    pub async fn run(
        &self,
        task_id: Uuid,
        prompt: &str,
        members: Vec<Agent>,
        synthesis_engine: &str,
    ) -> CouncilResult<CouncilOutcome> {
        info!(task_id = %task_id, members = members.len(), "Council convened");

        let (names, handles): (Vec<String>, Vec<_>) = members
            .into_iter()
            .map(|agent| {
                let name = agent.name.clone();
                let handle = tokio::spawn(consult(
                    agent,
                    prompt.to_string(),
                    task_id,
                    self.gateway.clone(),
                    self.cache.clone(),
                    self.events.clone(),
                ));
                (name, handle)
            })
            .unzip();

        let transcript: Vec<CouncilContribution> = names
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(name, joined)| match joined {
                Ok(contribution) => contribution,
                Err(e) => {
                    warn!(task_id = %task_id, agent = %name, error = %e, "Council member aborted");
                    let contribution =
                        CouncilContribution::degraded(name, format!("execution aborted: {e}"));
                    self.events.publish(Event::CouncilContribution {
                        task_id,
                        contribution: contribution.clone(),
                    });
                    contribution
                }
            })
            .collect();

        let degraded = transcript.iter().filter(|c| c.degraded).count();
        info!(task_id = %task_id, degraded, "Council answers collected, synthesizing");

        let answer = self
            .gateway
            .complete(synthesis_engine, &synthesis_prompt(prompt, &transcript))
            .await?;
        Ok(CouncilOutcome { answer, transcript })
    }
}

/// One member's turn: context, prompt, completion, broadcast.
async fn consult(
    agent: Agent,
    prompt: String,
    task_id: Uuid,
    gateway: Arc<CompletionGateway>,
    cache: Arc<KnowledgeCache>,
    events: Arc<EventBroadcaster>,
) -> CouncilContribution {
    let context = build_context(&agent, &cache);
    let member_prompt = council_member_prompt(&agent, &context, &prompt);
    let contribution = match gateway.complete(&agent.current_engine, &member_prompt).await {
        Ok(response) => CouncilContribution::answered(agent.name, response),
        Err(e) => {
            warn!(task_id = %task_id, agent = %agent.name, error = %e, "Council member degraded");
            CouncilContribution::degraded(agent.name, e)
        }
    };
    events.publish(Event::CouncilContribution {
        task_id,
        contribution: contribution.clone(),
    });
    contribution
}
