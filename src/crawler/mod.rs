//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and user agent rotation
//! - HTML parsing and same-site link extraction
//! - Concurrency limiting and request pacing
//! - Overall crawl coordination and per-seed reports

mod coordinator;
mod fetcher;
mod parser;
mod report;
mod request;
mod retry;
mod scheduler;

pub use coordinator::{CrawlOptions, Coordinator, SeedReport};
pub use fetcher::{
    build_http_client, classify_error, FetchError, FetchedPage, HttpFetcher, PageFetcher, Route,
    UserAgentPool,
};
pub use parser::{extract_links, DEFAULT_LINKS_PER_PAGE};
pub use report::{CrawlReport, FetchErrorKind, UrlStatus};
pub use request::CrawlRequest;
pub use retry::{RetryPolicy, Retryable};
pub use scheduler::{Pacer, Scheduler};
