use crate::prompts::{council_routing_prompt, single_routing_prompt};
use council_agent::CompletionGateway;
use council_core::{Agent, CouncilError, CouncilResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on council size.
pub const MAX_COUNCIL_SIZE: usize = 3;

/// Characters stripped from both ends of a name in a routing reply.
const NOISE: &[char] = &['"', '\'', '`', '*', '_', '.', ',', ';', ':', '!', '?', '-', '(', ')'];

/// Chooses agents for a request with one meta-completion per decision.
///
/// Routing makes a single attempt even on engines with a retry policy; a
/// failed call or a bad reply fails the task.
pub struct Router {
    gateway: Arc<CompletionGateway>,
    reserved: String,
}

impl Router {
    /// `reserved` is the orchestrator identity, which is never selectable.
    pub fn new(gateway: Arc<CompletionGateway>, reserved: impl Into<String>) -> Self {
        Self {
            gateway,
            reserved: reserved.into(),
        }
    }

    /// Picks exactly one candidate for `prompt`.
    pub async fn select_agent(
        &self,
        engine: &str,
        prompt: &str,
        candidates: &[Agent],
    ) -> CouncilResult<String> {
        let candidates = self.eligible(candidates)?;
        let reply = self
            .gateway
            .complete_once(engine, &single_routing_prompt(prompt, &candidates))
            .await?;
        debug!(reply = %reply.trim(), "Routing reply");

        let name = self.resolve(clean_token(&reply), &candidates)?;
        info!(agent = %name, "Request routed");
        Ok(name)
    }

    /// Picks one to [`MAX_COUNCIL_SIZE`] distinct candidates for `prompt`,
    /// in reply order.
    pub async fn select_council(
        &self,
        engine: &str,
        prompt: &str,
        candidates: &[Agent],
    ) -> CouncilResult<Vec<String>> {
        let candidates = self.eligible(candidates)?;
        let reply = self
            .gateway
            .complete_once(engine, &council_routing_prompt(prompt, &candidates))
            .await?;
        debug!(reply = %reply.trim(), "Council routing reply");

        let mut members: Vec<String> = Vec::new();
        for token in reply.split([',', '\n']).map(clean_token) {
            if token.is_empty() {
                continue;
            }
            let name = self.resolve(token, &candidates)?;
            if !members.contains(&name) {
                members.push(name);
            }
        }
        if members.is_empty() {
            return Err(CouncilError::InvalidSelection(format!(
                "router named no council members: '{}'",
                reply.trim()
            )));
        }
        members.truncate(MAX_COUNCIL_SIZE);
        info!(members = ?members, "Council routed");
        Ok(members)
    }

    fn is_reserved(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.reserved)
    }

    fn eligible(&self, candidates: &[Agent]) -> CouncilResult<Vec<Agent>> {
        let eligible: Vec<Agent> = candidates
            .iter()
            .filter(|a| !self.is_reserved(&a.name))
            .cloned()
            .collect();
        if eligible.is_empty() {
            return Err(CouncilError::InvalidSelection(
                "no routing candidates available".to_string(),
            ));
        }
        Ok(eligible)
    }

    /// Maps a cleaned reply token to the canonical candidate name.
    fn resolve(&self, token: &str, candidates: &[Agent]) -> CouncilResult<String> {
        if self.is_reserved(token) {
            return Err(CouncilError::InvalidSelection(format!(
                "'{token}' is reserved and cannot take tasks"
            )));
        }
        candidates
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(token))
            .map(|a| a.name.clone())
            .ok_or_else(|| {
                CouncilError::InvalidSelection(format!("'{token}' is not a known agent"))
            })
    }
}

/// Strips whitespace, quotes, markdown emphasis and punctuation.
fn clean_token(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || NOISE.contains(&c))
}
