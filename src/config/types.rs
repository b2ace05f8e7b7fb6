use serde::Deserialize;

use crate::proxy::{Anonymity, ProxyProtocol};

/// Main configuration structure for the harvester
///
/// Every section is optional; missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub cache: CacheConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub dns: DnsConfig,
    pub proxy: ProxyConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from seed URLs (negative values are rejected)
    pub max_depth: i64,

    /// Maximum number of concurrent fetches and MX lookups
    pub max_concurrency: usize,

    /// Advisory pacing across the whole crawl, if any
    pub requests_per_second: Option<f64>,

    /// Number of same-site links taken from any one page
    pub links_per_page: usize,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Total attempts per fetch, including the first
    pub max_attempts: u32,

    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Upper bound on a single backoff delay (milliseconds)
    pub retry_max_delay_ms: u64,

    /// Deadline for a whole crawl invocation, in seconds
    pub crawl_timeout_secs: Option<u64>,

    /// Route fetches through vetted proxies
    pub use_proxies: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_concurrency: 10,
            requests_per_second: None,
            links_per_page: crate::crawler::DEFAULT_LINKS_PER_PAGE,
            request_timeout_secs: 15,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
            crawl_timeout_secs: None,
            use_proxies: false,
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Seconds a cached seed result stays fresh
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3_600 }
    }
}

/// Client identities rotated across fetch attempts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    pub agents: Vec<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

/// DNS lookup configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DnsConfig {
    /// Timeout for a single MX lookup (milliseconds)
    pub timeout_ms: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

/// Proxy acquisition and selection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyConfig {
    /// Path to the SQLite database holding proxy health
    pub database_path: String,

    /// Lists of candidate proxies, one `host:port` per line
    pub sources: Vec<ProxySource>,

    /// Endpoint that echoes request headers back in its body
    pub probe_url: String,

    /// Endpoint that returns the caller's public address
    pub ip_echo_url: Option<String>,

    /// Timeout for a probe through a proxy (seconds)
    pub probe_timeout_secs: u64,

    /// Number of probes run at once
    pub probe_concurrency: usize,

    /// Weakest anonymity level used for crawling
    pub min_anonymity: Anonymity,

    /// Slowest measured latency used for crawling (milliseconds)
    pub max_latency_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            database_path: "proxies.db".to_string(),
            sources: Vec::new(),
            probe_url: "http://httpbin.org/headers".to_string(),
            ip_echo_url: Some("https://api.ipify.org".to_string()),
            probe_timeout_secs: 6,
            probe_concurrency: 25,
            min_anonymity: Anonymity::Anonymous,
            max_latency_ms: 5_000,
        }
    }
}

/// A published list of proxy endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySource {
    /// URL of the list
    pub url: String,

    /// Protocol spoken by every proxy in the list
    #[serde(default)]
    pub protocol: ProxyProtocol,
}
