//! Email Harvester: a depth-bounded, same-site email crawler
//!
//! This crate crawls outward from a set of seed URLs, following same-site links
//! up to a bounded depth, and collects the email addresses it finds. Addresses
//! are kept only when they pass a syntactic check and their domain publishes an
//! MX record. Requests can optionally be routed through a pool of health-scored
//! proxies.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod email;
pub mod harvester;
pub mod output;
pub mod proxy;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for harvest operations
///
/// Ordinary network failures never surface here: they are recorded per URL in
/// the [`crawler::CrawlReport`]. Only problems that prevent a crawl from
/// starting (bad configuration, unusable storage) are returned as errors.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("DNS resolution error: {0}")]
    Dns(#[from] email::DnsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlReport, CrawlRequest, FetchErrorKind, UrlStatus};
pub use harvester::{Harvester, HarvesterBuilder};
pub use proxy::{Anonymity, ProxyEndpoint, ProxyRecord, RefreshSummary};
pub use url::{normalize_seed, normalize_url};
