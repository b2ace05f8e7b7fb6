//! Proxy health store
//!
//! Wraps the persistent proxy table behind a mutex so probe tasks and crawl
//! tasks can share it. Each probe result is merged in a single statement under
//! the lock; readers get either the old or the new record, never a mix.

use crate::proxy::{ProbeOutcome, ProxyEndpoint, ProxyQuery, ProxyRecord};
use crate::storage::{
    init_database, ProxyStorage, RefreshRunRecord, SqliteStorage, StorageResult,
};
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Persistent, shareable proxy health store
pub struct ProxyHealthStore {
    storage: Mutex<SqliteStorage>,
}

impl ProxyHealthStore {
    /// Opens (or creates) the store at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self::from_storage(init_database(path)?))
    }

    /// Opens a store that lives only as long as the process
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::from_storage(SqliteStorage::new_in_memory()?))
    }

    pub fn from_storage(storage: SqliteStorage) -> Self {
        Self {
            storage: Mutex::new(storage),
        }
    }

    /// Merges one probe result into the endpoint's record
    pub fn record_probe(
        &self,
        endpoint: &ProxyEndpoint,
        outcome: &ProbeOutcome,
    ) -> StorageResult<()> {
        self.lock().record_probe(endpoint, outcome, Utc::now())
    }

    pub fn get(&self, endpoint: &ProxyEndpoint) -> StorageResult<Option<ProxyRecord>> {
        self.lock().get_proxy(endpoint)
    }

    /// Returns a ranked snapshot of vetted proxies meeting `query`
    ///
    /// Best first: success ratio descending, then latency ascending.
    /// Endpoints in `blacklist` are left out.
    pub fn ranked(
        &self,
        query: &ProxyQuery,
        blacklist: &Blacklist,
    ) -> StorageResult<Vec<ProxyRecord>> {
        let records = self.lock().query_proxies(query)?;
        Ok(records
            .into_iter()
            .filter(|record| !blacklist.contains(&record.endpoint))
            .collect())
    }

    pub fn vetted_count(&self) -> StorageResult<usize> {
        self.lock().count_vetted()
    }

    pub fn total_count(&self) -> StorageResult<usize> {
        self.lock().count_proxies()
    }

    pub fn begin_refresh(&self) -> StorageResult<i64> {
        self.lock().create_refresh_run()
    }

    pub fn finish_refresh(&self, run_id: i64, fetched: usize, validated: usize) -> StorageResult<()> {
        self.lock().complete_refresh_run(run_id, fetched, validated)
    }

    pub fn latest_refresh(&self) -> StorageResult<Option<RefreshRunRecord>> {
        self.lock().get_latest_refresh_run()
    }

    fn lock(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Endpoints excluded from selection for the rest of one crawl invocation
///
/// Entries are never persisted and never removed.
#[derive(Debug, Default)]
pub struct Blacklist {
    entries: Mutex<HashSet<String>>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an endpoint; returns false if it was already listed
    pub fn add(&self, endpoint: &ProxyEndpoint) -> bool {
        self.lock().insert(endpoint.key())
    }

    pub fn contains(&self, endpoint: &ProxyEndpoint) -> bool {
        self.lock().contains(&endpoint.key())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
