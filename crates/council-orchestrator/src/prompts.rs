use council_core::{Agent, CouncilContribution};

const ROUTING_HEADER: &str = "You route incoming requests to a team of specialist agents.";

fn candidate_list(candidates: &[Agent]) -> String {
    candidates
        .iter()
        .map(|a| {
            if a.description.is_empty() {
                format!("- {} ({})", a.name, a.primary_specialty)
            } else {
                format!("- {} ({}): {}", a.name, a.primary_specialty, a.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Meta-prompt asking for exactly one agent name.
pub fn single_routing_prompt(prompt: &str, candidates: &[Agent]) -> String {
    format!(
        "{ROUTING_HEADER}\n\nAgents:\n{}\n\nRequest:\n{prompt}\n\n\
         Reply with exactly one agent name from the list above and nothing else.",
        candidate_list(candidates)
    )
}

/// Meta-prompt asking for a comma-separated list of two or three names.
pub fn council_routing_prompt(prompt: &str, candidates: &[Agent]) -> String {
    format!(
        "{ROUTING_HEADER}\n\nAgents:\n{}\n\nRequest:\n{prompt}\n\n\
         Pick the two or three agents whose combined perspectives best answer the request. \
         Reply with their names as a comma-separated list and nothing else.",
        candidate_list(candidates)
    )
}

fn with_context(context: &str, body: String) -> String {
    if context.is_empty() {
        body
    } else {
        format!("{context}\n\n{body}")
    }
}

/// Execution prompt for a single agent.
pub fn agent_prompt(agent: &Agent, context: &str, prompt: &str) -> String {
    with_context(
        context,
        format!(
            "You are {}, a specialist in {}.\n\nRequest:\n{prompt}",
            agent.name, agent.primary_specialty
        ),
    )
}

/// Prompt sent to one council member.
pub fn council_member_prompt(agent: &Agent, context: &str, prompt: &str) -> String {
    with_context(
        context,
        format!(
            "As {}, specialty {}, give your opinion on: {prompt}",
            agent.name, agent.primary_specialty
        ),
    )
}

/// Prompt that merges council contributions into one answer. Contributions
/// are embedded verbatim; degraded ones are flagged.
pub fn synthesis_prompt(prompt: &str, contributions: &[CouncilContribution]) -> String {
    let opinions = contributions
        .iter()
        .map(|c| {
            let marker = if c.degraded { " (failed to respond)" } else { "" };
            format!("### {}{marker}\n{}", c.agent_name, c.response)
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "A council of specialists discussed the request below.\n\nRequest:\n{prompt}\n\n\
         Council opinions:\n{opinions}\n\n\
         Combine them into a single definitive answer addressed to the requester. \
         Ignore members that failed to respond."
    )
}
