use council_core::Agent;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-wide knowledge content keyed by source path.
///
/// Content is truncated to `max_chars` on ingestion. Last write wins.
pub struct KnowledgeCache {
    entries: RwLock<HashMap<String, String>>,
    max_chars: usize,
}

impl KnowledgeCache {
    pub fn new(max_chars: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_chars,
        }
    }

    /// Stores `content` under `source_path`, truncated on a char boundary.
    /// Returns the number of characters kept.
    pub fn insert(&self, source_path: impl Into<String>, content: &str) -> usize {
        let kept = match content.char_indices().nth(self.max_chars) {
            Some((cut, _)) => &content[..cut],
            None => content,
        };
        let count = kept.chars().count();
        self.entries
            .write()
            .insert(source_path.into(), kept.to_string());
        count
    }

    pub fn get(&self, source_path: &str) -> Option<String> {
        self.entries.read().get(source_path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Concatenates the cached content of the agent's knowledge bundles into a
/// context prefix. Bundles without cached content are skipped.
pub fn build_context(agent: &Agent, cache: &KnowledgeCache) -> String {
    let entries = cache.entries.read();
    agent
        .knowledge_bundles
        .iter()
        .filter_map(|bundle| {
            entries.get(&bundle.source_path).map(|content| {
                format!(
                    "--- Knowledge from {} ---\n{}\n--- End ---",
                    bundle.display_name, content
                )
            })
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
