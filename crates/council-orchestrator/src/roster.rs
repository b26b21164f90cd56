use council_core::Agent;

/// Create the default agent roster, used to seed an empty registry.
///
/// Every agent starts on `default_engine`; `engines` become each agent's
/// engine options (empty means unrestricted).
pub fn default_roster(
    default_engine: &str,
    orchestrator_agent: &str,
    engines: &[String],
) -> Vec<Agent> {
    vec![
        orchestrator(default_engine, orchestrator_agent),
        nova(default_engine),
        cypher(default_engine),
        forge(default_engine),
        atlas(default_engine),
    ]
    .into_iter()
    .map(|agent| agent.with_engine_options(engines.iter().cloned()))
    .collect()
}

fn orchestrator(engine: &str, name: &str) -> Agent {
    Agent::new(name, "routing", engine).with_description(ORCHESTRATOR_DESCRIPTION)
}

fn nova(engine: &str) -> Agent {
    Agent::new("Nova", "writing", engine)
        .with_secondary(vec!["marketing".into(), "storytelling".into()])
        .with_description(NOVA_DESCRIPTION)
}

fn cypher(engine: &str) -> Agent {
    Agent::new("Cypher", "security", engine)
        .with_secondary(vec!["cryptography".into(), "compliance".into()])
        .with_description(CYPHER_DESCRIPTION)
}

fn forge(engine: &str) -> Agent {
    Agent::new("Forge", "coding", engine)
        .with_secondary(vec!["architecture".into(), "debugging".into()])
        .with_description(FORGE_DESCRIPTION)
}

fn atlas(engine: &str) -> Agent {
    Agent::new("Atlas", "research", engine)
        .with_secondary(vec!["analysis".into(), "summarization".into()])
        .with_description(ATLAS_DESCRIPTION)
}

const ORCHESTRATOR_DESCRIPTION: &str =
    "Routes incoming requests to the best specialist and synthesizes council answers.";

const NOVA_DESCRIPTION: &str =
    "Creative writer. Copy, slogans, product descriptions, stories and tone-of-voice work.";

const CYPHER_DESCRIPTION: &str =
    "Security analyst. Threat models, vulnerability review, hardening and audit questions.";

const FORGE_DESCRIPTION: &str =
    "Software engineer. Writes, reviews and debugs code; designs system structure.";

const ATLAS_DESCRIPTION: &str =
    "Researcher. Gathers facts, compares options and condenses long material into summaries.";

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_roster_names_unique() {
        let roster = default_roster("default", "Orchestrator", &[]);
        let names: HashSet<_> = roster.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names.len(), roster.len());
        assert!(names.contains("Orchestrator"));
        assert!(names.contains("Nova"));
    }

    #[test]
    fn test_roster_engines_valid() {
        let engines = vec!["gpt".to_string(), "claude".to_string()];
        let roster = default_roster("gpt", "Orchestrator", &engines);
        for agent in &roster {
            assert_eq!(agent.current_engine, "gpt");
            assert!(agent.engine_is_valid());
            assert!(agent.allows_engine("claude"));
        }
    }

    #[test]
    fn test_custom_orchestrator_name() {
        let roster = default_roster("default", "Router", &[]);
        assert_eq!(roster[0].name, "Router");
    }
}
