//! Append-only conversation history.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::Row;
use tracing::debug;

use sage_core::error::SageError;
use sage_core::types::{HistoryRecord, NewHistoryRecord};

use crate::db::{storage_err, Database};

/// Storage contract for conversation history.
pub trait HistoryLog: Send + Sync {
    /// Persist one exchange, assigning its id and timestamp.
    fn append(&self, record: NewHistoryRecord) -> Result<HistoryRecord, SageError>;

    /// The newest `limit` records for `user_id`, newest first.
    fn recent(&self, user_id: i64, limit: usize) -> Result<Vec<HistoryRecord>, SageError>;

    fn count_for_user(&self, user_id: i64) -> Result<usize, SageError>;
}

/// SQLite-backed history log.
pub struct SqliteHistoryLog {
    db: Arc<Database>,
}

impl SqliteHistoryLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl HistoryLog for SqliteHistoryLog {
    fn append(&self, record: NewHistoryRecord) -> Result<HistoryRecord, SageError> {
        let now_ms = Utc::now().timestamp_millis();

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_history (user_id, message, response, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![record.user_id, record.message, record.response, now_ms],
            )
            .map_err(storage_err("Failed to append history"))?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!(id, user_id = record.user_id, "History record appended");

        Ok(HistoryRecord {
            id,
            user_id: record.user_id,
            message: record.message,
            response: record.response,
            timestamp: Utc.timestamp_millis_opt(now_ms).single().unwrap_or_default(),
        })
    }

    fn recent(&self, user_id: i64, limit: usize) -> Result<Vec<HistoryRecord>, SageError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, message, response, timestamp
                     FROM conversation_history
                     WHERE user_id = ?1
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?2",
                )
                .map_err(storage_err("Failed to prepare history query"))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit as i64], row_to_record)
                .map_err(storage_err("History query failed"))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row.map_err(|e| SageError::Storage(e.to_string()))?);
            }
            Ok(records)
        })
    }

    fn count_for_user(&self, user_id: i64) -> Result<usize, SageError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM conversation_history WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )
                .map_err(storage_err("Failed to count history"))?;
            Ok(count as usize)
        })
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let ts: i64 = row.get(4)?;
    Ok(HistoryRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message: row.get(2)?,
        response: row.get(3)?,
        timestamp: Utc.timestamp_millis_opt(ts).single().unwrap_or_default(),
    })
}
