//! Harvester facade
//!
//! The entry point callers use: it validates a [`CrawlRequest`], serves seeds
//! from the result cache where it can, runs one crawl over the rest and folds
//! every per-seed report into one [`CrawlReport`].
//!
//! A `Harvester` is meant to be long-lived. The result cache and the proxy
//! health store outlive individual invocations; everything else (visited set,
//! proxy blacklist, MX memo) is created fresh for each crawl.

use crate::cache::ResultCache;
use crate::config::Config;
use crate::crawler::{
    CrawlOptions, CrawlReport, CrawlRequest, Coordinator, HttpFetcher, PageFetcher, SeedReport,
};
use crate::email::{DnsMxResolver, MxResolver};
use crate::proxy::{ProxyAcquirer, ProxyHealthStore, ProxyQuery, ProxyRotation, RefreshSummary};
use crate::storage::RefreshRunRecord;
use crate::url::normalize_seed;
use crate::{HarvestError, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Long-lived harvesting service
pub struct Harvester {
    config: Config,
    resolver: Arc<dyn MxResolver>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    cache: ResultCache,
    proxy_store: OnceCell<Arc<ProxyHealthStore>>,
}

/// Builder for [`Harvester`] with replaceable collaborators
pub struct HarvesterBuilder {
    config: Config,
    resolver: Option<Arc<dyn MxResolver>>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    proxy_store: Option<Arc<ProxyHealthStore>>,
}

impl HarvesterBuilder {
    /// Replaces the system DNS resolver used for MX lookups
    pub fn resolver(mut self, resolver: Arc<dyn MxResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replaces the HTTP fetcher; proxy mode is then ignored
    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Uses an already opened proxy health store instead of `database-path`
    pub fn proxy_store(mut self, store: Arc<ProxyHealthStore>) -> Self {
        self.proxy_store = Some(store);
        self
    }

    pub fn build(self) -> Harvester {
        let resolver: Arc<dyn MxResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(DnsMxResolver::new(Duration::from_millis(
                self.config.dns.timeout_ms,
            ))),
        };

        let proxy_store = OnceCell::new();
        if let Some(store) = self.proxy_store {
            let _ = proxy_store.set(store);
        }

        Harvester {
            config: self.config,
            resolver,
            fetcher: self.fetcher,
            cache: ResultCache::new(),
            proxy_store,
        }
    }
}

impl Harvester {
    /// Creates a harvester with the system resolver and direct HTTP
    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> HarvesterBuilder {
        HarvesterBuilder {
            config,
            resolver: None,
            fetcher: None,
            proxy_store: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Harvests emails reachable from the request's seeds
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Emails found plus the status of every URL visited;
    ///   fetch failures appear here rather than as errors
    /// * `Err(HarvestError::InvalidConfiguration)` - The request was rejected
    ///   before any network traffic
    pub async fn harvest(&self, request: &CrawlRequest) -> Result<CrawlReport> {
        self.harvest_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`harvest`](Self::harvest), stopping early when `cancel` fires
    ///
    /// Pages completed before cancellation still contribute their emails.
    pub async fn harvest_with_cancel(
        &self,
        request: &CrawlRequest,
        cancel: CancellationToken,
    ) -> Result<CrawlReport> {
        request.validate()?;
        let seeds = normalize_seeds(&request.seeds)?;

        let mut combined = CrawlReport::default();
        if seeds.is_empty() {
            return Ok(combined);
        }

        let mut pending = Vec::new();
        for seed in &seeds {
            match self.cache.lookup(seed, request.cache_ttl) {
                Some(report) => {
                    tracing::info!("Serving {} from cache", seed);
                    combined.merge(report);
                }
                None => pending.push(seed.clone()),
            }
        }

        if pending.is_empty() {
            return Ok(combined);
        }

        let fetcher = self.fetcher_for(request)?;
        let coordinator = Coordinator::new(fetcher, Arc::clone(&self.resolver), CrawlOptions {
            max_depth: request.depth_limit(),
            links_per_page: self.config.crawler.links_per_page,
            concurrency: request.concurrency,
            requests_per_second: request.requests_per_second,
            deadline: self.config.crawler.crawl_timeout_secs.map(Duration::from_secs),
        });

        for SeedReport {
            seed,
            report,
            complete,
        } in coordinator.run(pending, cancel).await
        {
            if complete {
                self.cache.store(&seed, report.clone());
            } else {
                tracing::debug!("Not caching partial crawl of {}", seed);
            }
            tracing::info!(
                "Seed {}: {} emails from {} pages ({} failed)",
                seed,
                report.emails.len(),
                report.ok_count(),
                report.failed_count()
            );
            combined.merge(report);
        }

        Ok(combined)
    }

    /// Whether a cached report for `seed` is fresh under `[cache] ttl-secs`
    ///
    /// Unparseable seeds are never cached. A request built with its own
    /// [`cache_ttl`](CrawlRequest::cache_ttl) should be checked with
    /// [`is_cached_within`](Self::is_cached_within) instead.
    pub fn is_cached(&self, seed: &str) -> bool {
        self.is_cached_within(seed, self.cache_ttl())
    }

    /// Whether a cached report for `seed` is younger than `ttl`
    pub fn is_cached_within(&self, seed: &str, ttl: Duration) -> bool {
        normalize_seed(seed)
            .map(|url| self.cache.is_fresh(&url, ttl))
            .unwrap_or(false)
    }

    /// Returns the cached report for `seed` if it is fresh under `[cache] ttl-secs`
    pub fn get_cached(&self, seed: &str) -> Option<CrawlReport> {
        self.get_cached_within(seed, self.cache_ttl())
    }

    /// Returns the cached report for `seed` if it is younger than `ttl`
    ///
    /// This is the lookup [`harvest`](Self::harvest) performs with the
    /// request's TTL.
    pub fn get_cached_within(&self, seed: &str, ttl: Duration) -> Option<CrawlReport> {
        let url = normalize_seed(seed).ok()?;
        self.cache.lookup(&url, ttl)
    }

    /// Runs one proxy acquisition cycle against the configured sources
    pub async fn refresh_proxies(&self) -> Result<RefreshSummary> {
        let store = self.proxy_store()?;
        let acquirer = ProxyAcquirer::new(self.config.proxy.clone(), store)?;
        let summary = acquirer.refresh().await?;
        tracing::info!(
            "Proxy refresh: {} fetched, {} validated",
            summary.fetched,
            summary.validated
        );
        Ok(summary)
    }

    pub fn vetted_proxy_count(&self) -> Result<usize> {
        Ok(self.proxy_store()?.vetted_count()?)
    }

    pub fn total_proxy_count(&self) -> Result<usize> {
        Ok(self.proxy_store()?.total_count()?)
    }

    pub fn latest_proxy_refresh(&self) -> Result<Option<RefreshRunRecord>> {
        Ok(self.proxy_store()?.latest_refresh()?)
    }

    /// Opens the proxy health store on first use
    pub fn proxy_store(&self) -> Result<Arc<ProxyHealthStore>> {
        let store = self.proxy_store.get_or_try_init(|| {
            let path = Path::new(&self.config.proxy.database_path);
            tracing::debug!("Opening proxy database at {}", path.display());
            ProxyHealthStore::open(path).map(Arc::new)
        })?;
        Ok(Arc::clone(store))
    }

    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache.ttl_secs)
    }

    /// Chooses how this invocation's pages are fetched
    fn fetcher_for(&self, request: &CrawlRequest) -> Result<Arc<dyn PageFetcher>> {
        if let Some(fetcher) = &self.fetcher {
            return Ok(Arc::clone(fetcher));
        }

        if !request.use_proxies {
            return Ok(Arc::new(HttpFetcher::direct(&self.config)?));
        }

        let query = ProxyQuery {
            min_anonymity: self.config.proxy.min_anonymity,
            max_latency: Duration::from_millis(self.config.proxy.max_latency_ms),
        };
        let timeout = Duration::from_secs(self.config.crawler.request_timeout_secs);
        let store = self.proxy_store()?;
        let rotation = ProxyRotation::load(&store, &query, timeout)?;
        if rotation.available() == 0 {
            tracing::warn!("Proxy mode is on but no vetted proxy matches; every fetch will fail");
        }

        Ok(Arc::new(HttpFetcher::proxied(&self.config, rotation)))
    }
}

/// Normalizes and deduplicates seeds, keeping first-seen order
fn normalize_seeds(raw: &[String]) -> Result<Vec<Url>> {
    let mut seeds: Vec<Url> = Vec::with_capacity(raw.len());
    for seed in raw {
        let url = normalize_seed(seed).map_err(|e| {
            HarvestError::InvalidConfiguration(format!("invalid seed {:?}: {}", seed, e))
        })?;
        if !seeds.contains(&url) {
            seeds.push(url);
        }
    }
    Ok(seeds)
}
