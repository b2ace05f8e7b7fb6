//! Storage module for persisting proxy health
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Atomic merging of proxy probe results
//! - Ranked proxy queries
//! - Acquisition run tracking for statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{init_database, SqliteStorage};
pub use traits::{ProxyStorage, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    init_database(path)
}

/// Represents one proxy acquisition run
#[derive(Debug, Clone)]
pub struct RefreshRunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    /// Distinct candidates fetched from the sources
    pub fetched: usize,
    /// Candidates whose probe succeeded
    pub validated: usize,
}

impl RefreshRunRecord {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
