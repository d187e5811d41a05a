//! Database schema migrations.
//!
//! Applies the initial schema: the knowledge table, the conversation
//! history table, and the schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use sage_core::error::SageError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), SageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SageError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| SageError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: knowledge + conversation history.
///
/// Timestamps are epoch milliseconds so that ordering within one second
/// stays stable.
fn apply_v1(conn: &Connection) -> Result<(), SageError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS knowledge (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL CHECK (length(trim(title)) > 0),
            content     TEXT NOT NULL CHECK (length(trim(content)) > 0),
            category    TEXT,
            tags        TEXT NOT NULL DEFAULT '[]',
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_knowledge_updated
            ON knowledge (updated_at DESC);

        CREATE INDEX IF NOT EXISTS idx_knowledge_category
            ON knowledge (category)
            WHERE category IS NOT NULL;

        CREATE TABLE IF NOT EXISTS conversation_history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL,
            message     TEXT NOT NULL,
            response    TEXT NOT NULL,
            timestamp   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_user_time
            ON conversation_history (user_id, timestamp DESC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| SageError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
