//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Configures WAL mode and recommended PRAGMAs on initialization.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use sage_core::error::SageError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
///
/// Every read and write goes through the mutex, so concurrent pipeline
/// invocations are serialized at this boundary.
pub struct Database {
    conn: Mutex<Connection>,
    location: String,
}

/// Pragmas applied to file databases. WAL lets the CLI read while another
/// process appends history.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA busy_timeout = 5000;";

impl Database {
    /// Open (or create) a database at the given path, creating parent
    /// directories and running pending migrations.
    pub fn new(path: &Path) -> Result<Self, SageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(storage_err("Failed to open database"))?;
        conn.execute_batch(FILE_PRAGMAS)
            .map_err(storage_err("Failed to set pragmas"))?;

        let db = Self::init(conn, path.display().to_string())?;
        info!(path = %db.location, "Database opened");
        Ok(db)
    }

    /// Open a private in-memory database (tests and dry runs).
    pub fn in_memory() -> Result<Self, SageError> {
        let conn = Connection::open_in_memory()
            .map_err(storage_err("Failed to open in-memory db"))?;
        Self::init(conn, ":memory:".to_string())
    }

    fn init(conn: Connection, location: String) -> Result<Self, SageError> {
        let db = Self {
            conn: Mutex::new(conn),
            location,
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// File path of the database, or `:memory:`.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Run `f` with the connection while holding the lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, SageError>
    where
        F: FnOnce(&Connection) -> Result<T, SageError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SageError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .finish()
    }
}

/// Map a rusqlite error into a storage error with context.
pub(crate) fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> SageError + '_ {
    move |e| SageError::Storage(format!("{}: {}", context, e))
}
