//! Knowledge search ranking policy.
//!
//! The weights below are tunable policy, not a contract. The only ordering
//! callers may rely on: an exact title match outranks every other match, and
//! equal scores keep the store's most-recently-updated-first order.

use sage_core::types::KnowledgeEntry;

/// Title equals the query (or its keyword phrase).
pub const EXACT_TITLE_SCORE: u32 = 1_000;
/// Title contains the whole keyword phrase.
pub const TITLE_PHRASE_SCORE: u32 = 100;
/// Per keyword found in the title.
pub const TITLE_TERM_SCORE: u32 = 30;
/// Per keyword equal to one of the tags.
pub const TAG_EXACT_SCORE: u32 = 20;
/// Per keyword contained in a tag.
pub const TAG_TERM_SCORE: u32 = 10;
/// Per keyword found in the content.
pub const CONTENT_TERM_SCORE: u32 = 5;

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "could", "did", "do",
    "does", "explain", "for", "from", "give", "how", "i", "in", "is", "it", "me", "my", "of",
    "on", "or", "please", "tell", "that", "the", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "will", "with", "would", "you", "your",
];

/// A parsed search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Lowercased query with surrounding whitespace and punctuation removed.
    pub normalized: String,
    /// Distinct lowercase keywords, in query order.
    pub terms: Vec<String>,
}

impl SearchQuery {
    pub fn parse(query: &str) -> Self {
        let normalized = query
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        let mut terms: Vec<String> = Vec::new();
        for word in normalized.split(|c: char| !c.is_alphanumeric()) {
            if word.chars().count() < 2 || STOPWORDS.contains(&word) {
                continue;
            }
            if !terms.iter().any(|t| t == word) {
                terms.push(word.to_string());
            }
        }

        Self { normalized, terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The keywords joined by single spaces.
    pub fn phrase(&self) -> String {
        self.terms.join(" ")
    }
}

/// Score an entry against a query.
///
/// Returns `None` unless every keyword appears somewhere in the title,
/// content or tags (case-insensitive substring match).
pub fn score(entry: &KnowledgeEntry, query: &SearchQuery) -> Option<u32> {
    if query.is_empty() {
        return None;
    }

    let title = entry.title.to_lowercase();
    let content = entry.content.to_lowercase();
    let tags: Vec<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();
    let phrase = query.phrase();

    let mut total = 0u32;
    for term in &query.terms {
        let mut matched = false;
        if title.contains(term.as_str()) {
            total += TITLE_TERM_SCORE;
            matched = true;
        }
        if tags.iter().any(|t| t == term) {
            total += TAG_EXACT_SCORE;
            matched = true;
        } else if tags.iter().any(|t| t.contains(term.as_str())) {
            total += TAG_TERM_SCORE;
            matched = true;
        }
        if content.contains(term.as_str()) {
            total += CONTENT_TERM_SCORE;
            matched = true;
        }
        if !matched {
            return None;
        }
    }

    if title == query.normalized || title == phrase {
        total += EXACT_TITLE_SCORE;
    } else if title.contains(phrase.as_str()) {
        total += TITLE_PHRASE_SCORE;
    }

    Some(total)
}

/// Filter and order `entries` (already most-recently-updated first) by score.
pub fn rank(entries: Vec<KnowledgeEntry>, query: &SearchQuery, limit: usize) -> Vec<KnowledgeEntry> {
    let mut scored: Vec<(u32, KnowledgeEntry)> = entries
        .into_iter()
        .filter_map(|e| score(&e, query).map(|s| (s, e)))
        .collect();
    // Stable: equal scores keep recency order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, e)| e).collect()
}
