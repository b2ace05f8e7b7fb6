//! Crawl invocation parameters

use crate::config::Config;
use crate::config::validation::MAX_CONCURRENCY;
use crate::HarvestError;
use std::time::Duration;

/// Parameters of one harvest, fixed for its whole duration
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRequest {
    /// Seed URLs as the caller supplied them (scheme optional)
    pub seeds: Vec<String>,
    /// Link hops followed from each seed; the seed itself is depth 0
    pub max_depth: i64,
    /// Cap on concurrent fetches and MX lookups
    pub concurrency: usize,
    /// Advisory pacing of fetch dispatch across the invocation
    pub requests_per_second: Option<f64>,
    /// Route fetches through vetted proxies
    pub use_proxies: bool,
    /// How long a seed's cached report stays usable
    pub cache_ttl: Duration,
}

impl Default for CrawlRequest {
    fn default() -> Self {
        Self::from_config(&Config::default(), Vec::<String>::new())
    }
}

impl CrawlRequest {
    pub fn new<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_config(&Config::default(), seeds)
    }

    /// Derives a request from the `[crawler]` and `[cache]` sections
    pub fn from_config<I, S>(config: &Config, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seeds: seeds.into_iter().map(Into::into).collect(),
            max_depth: config.crawler.max_depth,
            concurrency: config.crawler.max_concurrency,
            requests_per_second: config.crawler.requests_per_second,
            use_proxies: config.crawler.use_proxies,
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
        }
    }

    pub fn max_depth(mut self, depth: i64) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn requests_per_second(mut self, rps: Option<f64>) -> Self {
        self.requests_per_second = rps;
        self
    }

    pub fn use_proxies(mut self, enabled: bool) -> Self {
        self.use_proxies = enabled;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Rejects requests that cannot start
    ///
    /// Runs before any network traffic.
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.max_depth < 0 {
            return Err(HarvestError::InvalidConfiguration(format!(
                "max depth must be non-negative, got {}",
                self.max_depth
            )));
        }

        if self.concurrency < 1 || self.concurrency > MAX_CONCURRENCY {
            return Err(HarvestError::InvalidConfiguration(format!(
                "concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY, self.concurrency
            )));
        }

        if let Some(rps) = self.requests_per_second {
            if !rps.is_finite() || rps <= 0.0 {
                return Err(HarvestError::InvalidConfiguration(format!(
                    "requests per second must be a positive number, got {}",
                    rps
                )));
            }
        }

        Ok(())
    }

    /// Depth limit as an unsigned value; call after [`validate`](Self::validate)
    pub fn depth_limit(&self) -> u32 {
        u32::try_from(self.max_depth.max(0)).unwrap_or(u32::MAX)
    }
}
