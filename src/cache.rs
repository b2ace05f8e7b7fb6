//! Per-seed result cache
//!
//! Maps a normalized seed URL to the report its last crawl produced, stamped
//! with the time it was stored. Entries are never evicted in the background:
//! a lookup checks staleness against the caller's TTL and treats old entries
//! as absent, and the next store for that seed overwrites them.

use crate::crawler::CrawlReport;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

/// A cached crawl result for one seed
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The report produced by crawling from this seed
    pub report: CrawlReport,

    /// When the crawl finished
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(report: CrawlReport) -> Self {
        Self {
            report,
            fetched_at: Utc::now(),
        }
    }

    /// Returns how long ago the entry was stored, as of `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    /// Checks whether the entry is still fresh at `now`
    ///
    /// Fresh means `now - fetched_at < ttl`, so a zero TTL never hits. An
    /// entry stamped in the future (clock adjustment) counts as age zero.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match self.age(now).to_std() {
            Ok(age) => age < ttl,
            Err(_) => !ttl.is_zero(),
        }
    }
}

/// Thread-safe seed → report cache shared across crawl invocations
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the report for a seed, replacing any previous entry
    pub fn store(&self, seed: &Url, report: CrawlReport) {
        self.insert_entry(seed, CacheEntry::new(report));
    }

    /// Stores an entry with an explicit timestamp
    pub fn insert_entry(&self, seed: &Url, entry: CacheEntry) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(seed.to_string(), entry);
    }

    /// Returns the cached report if it is younger than `ttl`
    pub fn lookup(&self, seed: &Url, ttl: Duration) -> Option<CrawlReport> {
        self.lookup_at(seed, ttl, Utc::now())
    }

    /// Same as [`lookup`](Self::lookup) with an explicit clock
    pub fn lookup_at(&self, seed: &Url, ttl: Duration, now: DateTime<Utc>) -> Option<CrawlReport> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match entries.get(seed.as_str()) {
            Some(entry) if entry.is_fresh(ttl, now) => Some(entry.report.clone()),
            Some(entry) => {
                tracing::debug!(
                    "Cache entry for {} is stale ({}s old)",
                    seed,
                    entry.age(now).num_seconds()
                );
                None
            }
            None => None,
        }
    }

    /// Checks for a fresh entry without cloning the report
    pub fn is_fresh(&self, seed: &Url, ttl: Duration) -> bool {
        let now = Utc::now();
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(seed.as_str())
            .map(|entry| entry.is_fresh(ttl, now))
            .unwrap_or(false)
    }

    /// Number of stored entries, fresh or stale
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
