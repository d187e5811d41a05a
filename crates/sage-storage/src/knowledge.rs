//! Knowledge store: entries that can be matched into a prompt.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::debug;

use sage_core::error::SageError;
use sage_core::types::{KnowledgeEntry, KnowledgeUpdate, NewKnowledgeEntry};

use crate::db::{storage_err, Database};
use crate::ranking::{self, SearchQuery};

/// Storage contract for knowledge entries.
///
/// Implementations must be safe to call from concurrent pipeline invocations.
pub trait KnowledgeStore: Send + Sync {
    /// Case-insensitive keyword search over title, content and tags.
    ///
    /// Returns at most `limit` entries, best match first. An empty result is
    /// not an error.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeEntry>, SageError>;

    /// Validate and store a new entry, assigning its id and timestamps.
    fn add(&self, entry: NewKnowledgeEntry) -> Result<KnowledgeEntry, SageError>;

    /// Apply a partial update and bump `updated_at`.
    fn update(&self, id: i64, update: KnowledgeUpdate) -> Result<KnowledgeEntry, SageError>;

    fn get(&self, id: i64) -> Result<Option<KnowledgeEntry>, SageError>;

    /// Entries whose category equals `category` exactly, newest first.
    fn list_by_category(&self, category: &str) -> Result<Vec<KnowledgeEntry>, SageError>;

    /// Every entry, most recently updated first.
    fn list_all(&self) -> Result<Vec<KnowledgeEntry>, SageError>;

    /// Distinct categories with their entry counts, alphabetically.
    fn categories(&self) -> Result<Vec<(String, usize)>, SageError>;

    fn count(&self) -> Result<usize, SageError>;
}

const SELECT_COLUMNS: &str =
    "SELECT id, title, content, category, tags, created_at, updated_at FROM knowledge";

/// SQLite-backed knowledge store.
pub struct SqliteKnowledgeStore {
    db: Arc<Database>,
}

impl SqliteKnowledgeStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn query_entries(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<KnowledgeEntry>, SageError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(storage_err("Failed to prepare knowledge query"))?;
            let rows = stmt
                .query_map(params, |row| Ok(row_to_entry(row)))
                .map_err(storage_err("Knowledge query failed"))?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(|e| SageError::Storage(e.to_string()))??);
            }
            Ok(entries)
        })
    }
}

impl KnowledgeStore for SqliteKnowledgeStore {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeEntry>, SageError> {
        let parsed = SearchQuery::parse(query);
        if parsed.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // LIKE narrows the rows; the final match and score are decided in Rust
        // because SQLite only folds ASCII case.
        let (clause, patterns) = candidate_filter(&parsed);
        let sql = format!("{}{} ORDER BY updated_at DESC, id DESC", SELECT_COLUMNS, clause);
        let params: Vec<&dyn rusqlite::ToSql> =
            patterns.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
        let candidates = self.query_entries(&sql, &params)?;
        let scanned = candidates.len();
        let ranked = ranking::rank(candidates, &parsed, limit);
        debug!(terms = ?parsed.terms, scanned, hits = ranked.len(), "Knowledge search");
        Ok(ranked)
    }

    fn add(&self, entry: NewKnowledgeEntry) -> Result<KnowledgeEntry, SageError> {
        let entry = entry.validated()?;
        let tags_json = serde_json::to_string(&entry.tags)?;
        let now = Utc::now();
        let now_ms = now.timestamp_millis();

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO knowledge (title, content, category, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![entry.title, entry.content, entry.category, tags_json, now_ms],
            )
            .map_err(storage_err("Failed to add knowledge"))?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!(id, title = %entry.title, "Knowledge entry added");

        // Round-trip through millis so the returned value equals what `get` reads back.
        let stamp = from_millis(now_ms);
        Ok(KnowledgeEntry {
            id,
            title: entry.title,
            content: entry.content,
            category: entry.category,
            tags: entry.tags,
            created_at: stamp,
            updated_at: stamp,
        })
    }

    fn update(&self, id: i64, update: KnowledgeUpdate) -> Result<KnowledgeEntry, SageError> {
        let existing = self
            .get(id)?
            .ok_or_else(|| SageError::Validation(format!("knowledge entry {} not found", id)))?;
        if update.is_empty() {
            return Ok(existing);
        }

        let merged = update.apply_to(&existing)?;
        let tags_json = serde_json::to_string(&merged.tags)?;
        // Never move updated_at backwards, even if the clock does.
        let now_ms = Utc::now()
            .timestamp_millis()
            .max(existing.updated_at.timestamp_millis() + 1);

        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE knowledge
                 SET title = ?1, content = ?2, category = ?3, tags = ?4, updated_at = ?5
                 WHERE id = ?6",
                rusqlite::params![merged.title, merged.content, merged.category, tags_json, now_ms, id],
            )
            .map_err(storage_err("Failed to update knowledge"))?;
            Ok(())
        })?;

        debug!(id, "Knowledge entry updated");

        Ok(KnowledgeEntry {
            id,
            title: merged.title,
            content: merged.content,
            category: merged.category,
            tags: merged.tags,
            created_at: existing.created_at,
            updated_at: from_millis(now_ms),
        })
    }

    fn get(&self, id: i64) -> Result<Option<KnowledgeEntry>, SageError> {
        self.db.with_conn(|conn| {
            let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
            let result = conn
                .query_row(&sql, rusqlite::params![id], |row| Ok(row_to_entry(row)))
                .optional()
                .map_err(storage_err("Failed to load knowledge entry"))?;
            result.transpose()
        })
    }

    fn list_by_category(&self, category: &str) -> Result<Vec<KnowledgeEntry>, SageError> {
        let sql = format!(
            "{} WHERE category = ?1 ORDER BY updated_at DESC, id DESC",
            SELECT_COLUMNS
        );
        self.query_entries(&sql, &[&category])
    }

    fn list_all(&self) -> Result<Vec<KnowledgeEntry>, SageError> {
        let sql = format!("{} ORDER BY updated_at DESC, id DESC", SELECT_COLUMNS);
        self.query_entries(&sql, &[])
    }

    fn categories(&self) -> Result<Vec<(String, usize)>, SageError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT category, COUNT(*) FROM knowledge
                     WHERE category IS NOT NULL
                     GROUP BY category
                     ORDER BY category ASC",
                )
                .map_err(storage_err("Failed to prepare category query"))?;
            let rows = stmt
                .query_map([], |row| {
                    let name: String = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    Ok((name, count as usize))
                })
                .map_err(storage_err("Category query failed"))?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| SageError::Storage(e.to_string()))?);
            }
            Ok(out)
        })
    }

    fn count(&self) -> Result<usize, SageError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM knowledge", [], |row| row.get(0))
                .map_err(storage_err("Failed to count knowledge"))?;
            Ok(count as usize)
        })
    }
}

/// WHERE clause requiring every ASCII keyword in the title, content or tags.
///
/// Non-ASCII keywords add no condition, since LIKE would miss their other
/// case forms. Keywords are alphanumeric, so they carry no LIKE wildcards.
fn candidate_filter(query: &SearchQuery) -> (String, Vec<String>) {
    let patterns: Vec<String> = query
        .terms
        .iter()
        .filter(|t| t.is_ascii())
        .map(|t| format!("%{}%", t))
        .collect();
    if patterns.is_empty() {
        return (String::new(), patterns);
    }
    let conditions: Vec<String> = (1..=patterns.len())
        .map(|n| format!("(title LIKE ?{n} OR content LIKE ?{n} OR tags LIKE ?{n})"))
        .collect();
    (format!(" WHERE {}", conditions.join(" AND ")), patterns)
}

fn from_millis(ms: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn row_to_entry(row: &Row<'_>) -> Result<KnowledgeEntry, SageError> {
    let get_err = |e: rusqlite::Error| SageError::Storage(e.to_string());

    let tags_json: String = row.get(4).map_err(get_err)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| SageError::Storage(format!("Invalid tags JSON: {}", e)))?;

    Ok(KnowledgeEntry {
        id: row.get(0).map_err(get_err)?,
        title: row.get(1).map_err(get_err)?,
        content: row.get(2).map_err(get_err)?,
        category: row.get(3).map_err(get_err)?,
        tags,
        created_at: from_millis(row.get(5).map_err(get_err)?),
        updated_at: from_millis(row.get(6).map_err(get_err)?),
    })
}
