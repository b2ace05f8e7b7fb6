//! Per-invocation proxy rotation
//!
//! A rotation takes one ranked snapshot from the health store when a crawl
//! starts and hands out its endpoints round-robin. A proxy that fails a fetch
//! at the connection level goes on the invocation's blacklist and is skipped
//! from then on; the persisted counters are left to the probe cycle.

use crate::proxy::{Blacklist, ProxyEndpoint, ProxyHealthStore, ProxyQuery};
use crate::storage::StorageResult;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Round-robin selector over a ranked proxy snapshot
pub struct ProxyRotation {
    snapshot: Vec<ProxyEndpoint>,
    cursor: AtomicUsize,
    blacklist: Arc<Blacklist>,
    clients: Mutex<HashMap<String, Client>>,
    request_timeout: Duration,
}

impl ProxyRotation {
    /// Loads the ranked snapshot for one crawl invocation
    pub fn load(
        store: &ProxyHealthStore,
        query: &ProxyQuery,
        request_timeout: Duration,
    ) -> StorageResult<Self> {
        let blacklist = Arc::new(Blacklist::new());
        let snapshot = store
            .ranked(query, &blacklist)?
            .into_iter()
            .map(|record| record.endpoint)
            .collect::<Vec<_>>();

        tracing::info!("Loaded {} vetted proxies for this crawl", snapshot.len());
        Ok(Self::from_endpoints(snapshot, blacklist, request_timeout))
    }

    pub fn from_endpoints(
        snapshot: Vec<ProxyEndpoint>,
        blacklist: Arc<Blacklist>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            snapshot,
            cursor: AtomicUsize::new(0),
            blacklist,
            clients: Mutex::new(HashMap::new()),
            request_timeout,
        }
    }

    /// Returns the next usable proxy and a client routed through it
    ///
    /// Blacklisted endpoints are skipped, as are endpoints whose client cannot
    /// be built (those are blacklisted too). `None` means no proxy is left.
    pub fn next(&self) -> Option<(ProxyEndpoint, Client)> {
        if self.snapshot.is_empty() {
            return None;
        }

        for _ in 0..self.snapshot.len() {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.snapshot.len();
            let endpoint = &self.snapshot[index];

            if self.blacklist.contains(endpoint) {
                continue;
            }

            match self.client_for(endpoint) {
                Ok(client) => return Some((endpoint.clone(), client)),
                Err(e) => {
                    tracing::warn!("Cannot build client for proxy {}: {}", endpoint, e);
                    self.blacklist.add(endpoint);
                }
            }
        }

        None
    }

    /// Excludes a proxy for the rest of the invocation
    pub fn report_failure(&self, endpoint: &ProxyEndpoint) {
        if self.blacklist.add(endpoint) {
            tracing::warn!("Blacklisted proxy {} for this crawl", endpoint);
        }
    }

    pub fn is_blacklisted(&self, endpoint: &ProxyEndpoint) -> bool {
        self.blacklist.contains(endpoint)
    }

    /// Proxies still eligible for selection
    pub fn available(&self) -> usize {
        self.snapshot
            .iter()
            .filter(|endpoint| !self.blacklist.contains(endpoint))
            .count()
    }

    fn client_for(&self, endpoint: &ProxyEndpoint) -> Result<Client, reqwest::Error> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(client) = clients.get(&endpoint.key()) {
            return Ok(client.clone());
        }

        let client = proxied_client(endpoint, self.request_timeout)?;
        clients.insert(endpoint.key(), client.clone());
        Ok(client)
    }
}

/// Builds an HTTP client that sends every request through `endpoint`
pub fn proxied_client(endpoint: &ProxyEndpoint, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .proxy(reqwest::Proxy::all(endpoint.url())?)
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}
