//! Sage storage crate - SQLite persistence for knowledge and conversation history.
//!
//! Provides a WAL-mode SQLite database with migrations, the `KnowledgeStore`
//! and `HistoryLog` contracts with their SQLite implementations, the
//! knowledge ranking policy, and sample-data seeding.

pub mod db;
pub mod history;
pub mod knowledge;
pub mod migrations;
pub mod ranking;
pub mod seed;

pub use db::Database;
pub use history::{HistoryLog, SqliteHistoryLog};
pub use knowledge::{KnowledgeStore, SqliteKnowledgeStore};
pub use seed::{sample_entries, seed_if_empty};
