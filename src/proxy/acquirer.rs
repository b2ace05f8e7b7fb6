//! Proxy acquisition
//!
//! A refresh pulls candidate endpoints from the configured list sources,
//! deduplicates them by `host:port`, probes each one through itself and merges
//! every outcome into the health store.
//!
//! A probe succeeds on a 2xx answer within the probe timeout. The probe URL is
//! expected to echo the request headers it received, which is how anonymity is
//! judged:
//! - the real client address appears in the echo: transparent
//! - forwarding headers appear without it: anonymous
//! - neither: elite

use crate::config::{ProxyConfig, ProxySource};
use crate::proxy::rotation::proxied_client;
use crate::proxy::{Anonymity, ProbeOutcome, ProxyEndpoint, ProxyHealthStore};
use crate::storage::StorageResult;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Regex pattern to match IP:PORT patterns in noisy text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b").expect("Invalid regex")
});

/// Headers a proxy adds when it admits to proxying
const FORWARDING_HEADERS: &[&str] = &[
    "x-forwarded-for",
    "x-real-ip",
    "forwarded",
    "via",
    "client-ip",
    "x-proxy-id",
    "proxy-connection",
];

/// Totals of one acquisition run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Distinct candidates taken from the sources
    pub fetched: usize,
    /// Candidates whose probe succeeded
    pub validated: usize,
}

/// Fetches, probes and records proxy candidates
pub struct ProxyAcquirer {
    client: Client,
    store: Arc<ProxyHealthStore>,
    config: ProxyConfig,
}

impl ProxyAcquirer {
    pub fn new(config: ProxyConfig, store: Arc<ProxyHealthStore>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs.max(1) * 2))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            store,
            config,
        })
    }

    /// Runs one full acquisition cycle
    ///
    /// Unreachable sources and failed probes are expected and only logged;
    /// errors are returned only when the store itself fails.
    pub async fn refresh(&self) -> StorageResult<RefreshSummary> {
        let run_id = self.store.begin_refresh()?;

        let real_ip = self.discover_public_ip().await;
        let candidates = self.fetch_candidates().await;
        let fetched = candidates.len();
        tracing::info!(
            "Probing {} proxy candidates from {} sources",
            fetched,
            self.config.sources.len()
        );

        let probe_timeout = Duration::from_secs(self.config.probe_timeout_secs);
        let probe_url = self.config.probe_url.as_str();
        let real_ip = real_ip.as_deref();

        let outcomes: Vec<(ProxyEndpoint, ProbeOutcome)> = stream::iter(candidates)
            .map(|endpoint| async move {
                let outcome = probe(&endpoint, probe_url, probe_timeout, real_ip).await;
                (endpoint, outcome)
            })
            .buffer_unordered(self.config.probe_concurrency.max(1))
            .collect()
            .await;

        let mut validated = 0;
        for (endpoint, outcome) in &outcomes {
            if outcome.is_success() {
                validated += 1;
            }
            self.store.record_probe(endpoint, outcome)?;
        }

        self.store.finish_refresh(run_id, fetched, validated)?;
        tracing::info!(
            "Proxy refresh complete: {} fetched, {} validated",
            fetched,
            validated
        );

        Ok(RefreshSummary { fetched, validated })
    }

    /// Asks the IP echo service for this host's public address
    async fn discover_public_ip(&self) -> Option<String> {
        let url = self.config.ip_echo_url.as_deref()?;

        let body = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok()?,
            Ok(response) => {
                tracing::warn!("IP echo {} answered {}", url, response.status());
                return None;
            }
            Err(e) => {
                tracing::warn!("IP echo {} failed: {}", url, e);
                return None;
            }
        };

        let candidate = body.trim();
        match candidate.parse::<IpAddr>() {
            Ok(ip) => {
                tracing::debug!("Public address is {}", ip);
                Some(ip.to_string())
            }
            Err(_) => {
                tracing::warn!("IP echo {} returned a non-address body", url);
                None
            }
        }
    }

    /// Downloads every source and returns the distinct endpoints
    async fn fetch_candidates(&self) -> Vec<ProxyEndpoint> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for source in &self.config.sources {
            let endpoints = match self.fetch_source(source).await {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    tracing::warn!("Proxy source {} failed: {}", source.url, e);
                    continue;
                }
            };

            tracing::debug!("Source {} listed {} proxies", source.url, endpoints.len());
            for endpoint in endpoints {
                if seen.insert(endpoint.key()) {
                    candidates.push(endpoint);
                }
            }
        }

        candidates
    }

    async fn fetch_source(&self, source: &ProxySource) -> Result<Vec<ProxyEndpoint>, reqwest::Error> {
        let body = self
            .client
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_proxy_list(&body, source))
    }
}

/// Probes one proxy by fetching `probe_url` through it
async fn probe(
    endpoint: &ProxyEndpoint,
    probe_url: &str,
    timeout: Duration,
    real_ip: Option<&str>,
) -> ProbeOutcome {
    let client = match proxied_client(endpoint, timeout) {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!("Skipping proxy {}: {}", endpoint, e);
            return ProbeOutcome::Failure;
        }
    };

    let started = Instant::now();
    let attempt = async {
        let response = client.get(probe_url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>((status, body))
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok((status, body))) if status.is_success() => ProbeOutcome::Success {
            latency: started.elapsed(),
            anonymity: classify_anonymity(&body, real_ip),
        },
        Ok(Ok((status, _))) => {
            tracing::debug!("Proxy {} answered {}", endpoint, status);
            ProbeOutcome::Failure
        }
        Ok(Err(e)) => {
            tracing::debug!("Proxy {} failed: {}", endpoint, e);
            ProbeOutcome::Failure
        }
        Err(_) => {
            tracing::debug!("Proxy {} timed out", endpoint);
            ProbeOutcome::Failure
        }
    }
}

/// Judges anonymity from the headers a probe target echoed back
pub fn classify_anonymity(echo: &str, real_ip: Option<&str>) -> Anonymity {
    if let Some(ip) = real_ip {
        if !ip.is_empty() && echo.contains(ip) {
            return Anonymity::Transparent;
        }
    }

    let lowered = echo.to_lowercase();
    let has_forwarding_header = FORWARDING_HEADERS.iter().any(|name| {
        lowered.contains(&format!("\"{}\"", name))
            || lowered
                .lines()
                .any(|line| line.trim_start().starts_with(&format!("{}:", name)))
    });

    if has_forwarding_header {
        Anonymity::Anonymous
    } else {
        Anonymity::Elite
    }
}

/// Parses a published proxy list
///
/// Lines of the form `host:port` (optionally prefixed with a scheme) are read
/// first. If none parse, IPv4 `ip:port` pairs are pulled out of the text.
pub fn parse_proxy_list(content: &str, source: &ProxySource) -> Vec<ProxyEndpoint> {
    let mut endpoints: Vec<ProxyEndpoint> = content
        .lines()
        .filter_map(|line| parse_line(line, source))
        .collect();

    if endpoints.is_empty() {
        endpoints = IP_PORT_REGEX
            .captures_iter(content)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str();
                if host.parse::<std::net::Ipv4Addr>().is_err() {
                    return None;
                }
                let port: u16 = cap.get(2)?.as_str().parse().ok()?;
                (port != 0).then(|| ProxyEndpoint::new(source.protocol, host, port))
            })
            .collect();
    }

    let mut seen = HashSet::new();
    endpoints.retain(|endpoint| seen.insert(endpoint.key()));
    endpoints
}

fn parse_line(line: &str, source: &ProxySource) -> Option<ProxyEndpoint> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let rest = line.split_once("://").map(|(_, rest)| rest).unwrap_or(line);
    let rest = rest.split_whitespace().next()?;
    let (host, port) = rest.rsplit_once(':')?;

    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return None;
    }

    let port: u16 = port.trim_end_matches('/').parse().ok()?;
    if port == 0 {
        return None;
    }

    Some(ProxyEndpoint::new(source.protocol, host.to_lowercase(), port))
}
