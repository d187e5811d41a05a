//! Knowledge grounding for the completion prompt.
//!
//! Searches the knowledge store with the user's message and formats the
//! best matches into a length-bounded block. Grounding is best effort: a
//! failed search yields an empty block and the error text for the caller
//! to log.

use std::sync::Arc;

use tracing::{debug, warn};

use sage_core::config::KnowledgeConfig;
use sage_core::types::KnowledgeEntry;
use sage_storage::KnowledgeStore;

const HEADER: &str = "Relevant knowledge:\n\n";
const SEPARATOR_WIDTH: usize = 50;

/// The outcome of one context build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledContext {
    /// Formatted knowledge; empty when nothing matched.
    pub block: String,
    /// Ids of the entries present in `block`, best first.
    pub matched_ids: Vec<i64>,
    /// Set when the search itself failed.
    pub search_error: Option<String>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }
}

pub struct ContextAssembler {
    store: Arc<dyn KnowledgeStore>,
    limit: usize,
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn KnowledgeStore>, limit: usize, max_chars: usize) -> Self {
        Self {
            store,
            limit,
            max_chars,
        }
    }

    pub fn from_config(store: Arc<dyn KnowledgeStore>, config: &KnowledgeConfig) -> Self {
        Self::new(store, config.context_limit, config.max_context_chars)
    }

    /// Build the knowledge block for `message`. Never fails.
    pub fn build_context(&self, message: &str) -> AssembledContext {
        let entries = match self.store.search(message, self.limit) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Knowledge search failed, continuing without context");
                return AssembledContext {
                    search_error: Some(e.to_string()),
                    ..AssembledContext::default()
                };
            }
        };

        let context = self.format(&entries);
        debug!(
            matched = entries.len(),
            included = context.matched_ids.len(),
            chars = context.block.chars().count(),
            "Context assembled"
        );
        context
    }

    fn format(&self, entries: &[KnowledgeEntry]) -> AssembledContext {
        let mut context = AssembledContext::default();
        if entries.is_empty() {
            return context;
        }

        let header_len = HEADER.chars().count();
        if header_len >= self.max_chars {
            return context;
        }

        let mut block = String::from(HEADER);
        let mut used = header_len;
        for entry in entries {
            let section = format_entry(entry);
            let len = section.chars().count();
            if used + len <= self.max_chars {
                block.push_str(&section);
                used += len;
                context.matched_ids.push(entry.id);
                continue;
            }
            // The best match is kept even when it has to be cut.
            if context.matched_ids.is_empty() {
                block.extend(section.chars().take(self.max_chars - used));
                context.matched_ids.push(entry.id);
            }
            break;
        }

        context.block = block;
        context
    }
}

fn format_entry(entry: &KnowledgeEntry) -> String {
    let tags = if entry.tags.is_empty() {
        "None".to_string()
    } else {
        entry.tags.join(", ")
    };
    format!(
        "Title: {}\nCategory: {}\nContent: {}\nTags: {}\n{}\n",
        entry.title,
        entry.category.as_deref().unwrap_or("None"),
        entry.content,
        tags,
        "-".repeat(SEPARATOR_WIDTH)
    )
}
