//! Storage traits and error types
//!
//! This module defines the trait interface for proxy health persistence and
//! associated error types.

use crate::proxy::{ProbeOutcome, ProxyEndpoint, ProxyQuery, ProxyRecord};
use crate::storage::RefreshRunRecord;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Refresh run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for proxy health storage backends
///
/// Every write merges a complete record in one statement, so readers never
/// observe a half-updated proxy.
pub trait ProxyStorage {
    // ===== Proxy Health =====

    /// Merges one probe result into a proxy's record, creating it if needed
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The proxy that was probed
    /// * `outcome` - Success (with latency and anonymity) or failure
    /// * `at` - When the probe finished
    ///
    /// On success both counters increment and latency, anonymity and
    /// `last_checked` are replaced. On failure only the attempt counter moves.
    fn record_probe(
        &mut self,
        endpoint: &ProxyEndpoint,
        outcome: &ProbeOutcome,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Gets the record for a single proxy
    fn get_proxy(&self, endpoint: &ProxyEndpoint) -> StorageResult<Option<ProxyRecord>>;

    /// Returns vetted proxies meeting the query, best first
    ///
    /// Ordered by success ratio descending, then latency ascending.
    fn query_proxies(&self, query: &ProxyQuery) -> StorageResult<Vec<ProxyRecord>>;

    /// Counts proxies with at least one successful probe
    fn count_vetted(&self) -> StorageResult<usize>;

    /// Counts every known proxy
    fn count_proxies(&self) -> StorageResult<usize>;

    // ===== Refresh Runs =====

    /// Records the start of an acquisition run and returns its ID
    fn create_refresh_run(&mut self) -> StorageResult<i64>;

    /// Records the totals of a finished acquisition run
    fn complete_refresh_run(
        &mut self,
        run_id: i64,
        fetched: usize,
        validated: usize,
    ) -> StorageResult<()>;

    /// Gets the most recent acquisition run
    fn get_latest_refresh_run(&self) -> StorageResult<Option<RefreshRunRecord>>;
}
