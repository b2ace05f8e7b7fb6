//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients
//! - Rotating the user agent on every attempt
//! - Retrying transient failures with backoff
//! - Routing through the proxy rotation when proxy mode is on
//! - Error classification

use crate::config::Config;
use crate::crawler::report::FetchErrorKind;
use crate::crawler::retry::{RetryPolicy, Retryable};
use crate::crawler::scheduler::Pacer;
use crate::proxy::{ProxyEndpoint, ProxyRotation};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A page body retrieved with a 2xx status
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Decoded body; undecodable bytes are replaced, never fatal
    pub body: String,
}

/// Why a fetch gave up
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("No proxy available")]
    NoProxyAvailable,
}

impl FetchError {
    /// The kind recorded in crawl reports
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Timeout => FetchErrorKind::FetchTimeout,
            Self::Connection(_) => FetchErrorKind::FetchConnectionError,
            Self::Http { status } => FetchErrorKind::FetchHttpError(*status),
            Self::NoProxyAvailable => FetchErrorKind::NoProxyAvailable,
        }
    }

    /// Failures that implicate the proxy rather than the target
    pub fn is_proxy_attributable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection(_))
    }
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) => true,
            Self::Http { status } => (500..=599).contains(status),
            Self::NoProxyAvailable => false,
        }
    }
}

/// Retrieves a single page
///
/// The crawl engine only sees this seam, so tests can substitute a scripted
/// fetcher and the real one can route directly or through proxies.
///
/// Implementations wait on `pacer` before each request they send, so a
/// retried page spends one unit of the rate budget per attempt.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, pacer: &Pacer) -> Result<FetchedPage, FetchError>;
}

/// Round-robin pool of user agent strings
#[derive(Debug)]
pub struct UserAgentPool {
    agents: Vec<String>,
    cursor: AtomicUsize,
}

impl UserAgentPool {
    pub fn new(agents: Vec<String>) -> Self {
        Self {
            agents,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Returns the next identity; an empty pool yields reqwest's default
    pub fn next(&self) -> Option<&str> {
        if self.agents.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        Some(self.agents[index].as_str())
    }
}

/// How requests leave the process
pub enum Route {
    Direct(Client),
    Proxied(ProxyRotation),
}

/// [`PageFetcher`] over reqwest
pub struct HttpFetcher {
    route: Route,
    retry: RetryPolicy,
    agents: UserAgentPool,
}

impl HttpFetcher {
    pub fn new(route: Route, retry: RetryPolicy, agents: UserAgentPool) -> Self {
        Self {
            route,
            retry,
            agents,
        }
    }

    /// Builds a fetcher that connects to targets directly
    pub fn direct(config: &Config) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
        Ok(Self::new(
            Route::Direct(build_http_client(timeout)?),
            RetryPolicy::from_config(&config.crawler),
            UserAgentPool::new(config.user_agent.agents.clone()),
        ))
    }

    /// Builds a fetcher that sends every request through `rotation`
    pub fn proxied(config: &Config, rotation: ProxyRotation) -> Self {
        Self::new(
            Route::Proxied(rotation),
            RetryPolicy::from_config(&config.crawler),
            UserAgentPool::new(config.user_agent.agents.clone()),
        )
    }

    async fn attempt(
        &self,
        url: &Url,
        pacer: &Pacer,
        attempt: u32,
    ) -> Result<FetchedPage, FetchError> {
        pacer.ready().await;
        let agent = self.agents.next();

        match &self.route {
            Route::Direct(client) => {
                tracing::debug!("GET {} (attempt {})", url, attempt);
                send(client, url, agent).await
            }
            Route::Proxied(rotation) => {
                let (endpoint, client) = rotation.next().ok_or(FetchError::NoProxyAvailable)?;
                tracing::debug!("GET {} via {} (attempt {})", url, endpoint, attempt);

                let result = send(&client, url, agent).await;
                if let Err(e) = &result {
                    report_proxy_failure(rotation, &endpoint, e);
                }
                result
            }
        }
    }
}

fn report_proxy_failure(rotation: &ProxyRotation, endpoint: &ProxyEndpoint, error: &FetchError) {
    if error.is_proxy_attributable() {
        rotation.report_failure(endpoint);
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, pacer: &Pacer) -> Result<FetchedPage, FetchError> {
        self.retry
            .run(|attempt| self.attempt(url, pacer, attempt))
            .await
    }
}

/// Builds the direct HTTP client
///
/// The user agent is not fixed here: it is chosen per request from the
/// rotation pool.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

async fn send(client: &Client, url: &Url, agent: Option<&str>) -> Result<FetchedPage, FetchError> {
    let mut request = client.get(url.clone());
    if let Some(agent) = agent {
        request = request.header(USER_AGENT, agent);
    }

    let response = request.send().await.map_err(classify_error)?;
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let body = response.text().await.map_err(classify_error)?;

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        body,
    })
}

/// Maps a reqwest error onto the fetch error kinds
pub fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_connect() {
        FetchError::Connection(error.to_string())
    } else if let Some(status) = error.status() {
        FetchError::Http {
            status: status.as_u16(),
        }
    } else {
        FetchError::Connection(error.to_string())
    }
}
