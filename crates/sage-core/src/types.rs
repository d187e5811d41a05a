use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SageError};

// =============================================================================
// Knowledge
// =============================================================================

/// A stored piece of knowledge that can be matched into a prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Monotonic identifier assigned by the store.
    pub id: i64,
    /// Short title, matched with the highest weight during search.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Free-form category tag.
    pub category: Option<String>,
    /// Keyword tags, unique case-insensitively.
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a knowledge entry that has not been stored yet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewKnowledgeEntry {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewKnowledgeEntry {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category: None,
            tags: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Trim every field and reject empty titles or content.
    ///
    /// Blank categories become `None`; tags are trimmed, blank tags dropped
    /// and duplicates (ignoring case) removed, keeping the first spelling.
    pub fn validated(self) -> Result<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(SageError::Validation("title must not be empty".to_string()));
        }
        let content = self.content.trim().to_string();
        if content.is_empty() {
            return Err(SageError::Validation(
                "content must not be empty".to_string(),
            ));
        }
        Ok(Self {
            title,
            content,
            category: normalize_category(self.category),
            tags: normalize_tags(self.tags),
        })
    }
}

/// Partial update of a stored knowledge entry. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl KnowledgeUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category.is_none()
            && self.tags.is_none()
    }

    /// Apply the update on top of `entry`, validating the merged result.
    pub fn apply_to(self, entry: &KnowledgeEntry) -> Result<NewKnowledgeEntry> {
        NewKnowledgeEntry {
            title: self.title.unwrap_or_else(|| entry.title.clone()),
            content: self.content.unwrap_or_else(|| entry.content.clone()),
            category: self.category.or_else(|| entry.category.clone()),
            tags: self.tags.unwrap_or_else(|| entry.tags.clone()),
        }
        .validated()
    }
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(tags.len());
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        let folded = tag.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        out.push(tag.to_string());
    }
    out
}

// =============================================================================
// History
// =============================================================================

/// One persisted exchange between a user and the assistant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub user_id: i64,
    /// What the user said (or the transcript of what they said).
    pub message: String,
    /// The assistant's reply text.
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// Fields for a history record about to be appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryRecord {
    pub user_id: i64,
    pub message: String,
    pub response: String,
}

// =============================================================================
// Voices
// =============================================================================

/// An entry of the remote voice catalogue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub id: String,
    pub name: String,
    /// Catalogue category such as "premade", "cloned" or "generated".
    pub category: String,
}
