//! Mail-exchange validation of candidate addresses
//!
//! A candidate survives only if the domain after its rightmost `@` publishes
//! at least one MX record. Lookups are bounded by a timeout and never retried:
//! NXDOMAIN, an empty answer, a timeout and any resolver failure all mean the
//! address is dropped for this invocation.
//!
//! The resolver sits behind [`MxResolver`] so tests can answer from a table.

use crate::email::extract::mail_domain;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OnceCell, Semaphore};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

/// Reasons an MX lookup produced no usable answer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsError {
    #[error("Domain does not exist: {0}")]
    NxDomain(String),

    #[error("No MX records for {0}")]
    NoRecords(String),

    #[error("MX lookup timed out for {0}")]
    Timeout(String),

    #[error("Resolver error for {domain}: {message}")]
    Resolver { domain: String, message: String },
}

/// Source of MX answers
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// Returns the mail exchanger hostnames for a domain
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, DnsError>;
}

/// [`MxResolver`] backed by trust-dns
pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsMxResolver {
    /// Creates a resolver from the system configuration, falling back to the
    /// library's default upstream servers when it cannot be read
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match trust_dns_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                tracing::debug!("System DNS configuration unavailable ({}), using defaults", e);
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout,
        }
    }
}

#[async_trait]
impl MxResolver for DnsMxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        // Trailing dot keeps search domains from being appended
        let fqdn = format!("{}.", domain.trim_end_matches('.'));

        let lookup = tokio::time::timeout(self.timeout, self.resolver.mx_lookup(fqdn.as_str()))
            .await
            .map_err(|_| DnsError::Timeout(domain.to_string()))?
            .map_err(|e| classify_resolve_error(domain, &e))?;

        Ok(lookup
            .iter()
            .map(|mx| mx.exchange().to_utf8())
            .collect())
    }
}

fn classify_resolve_error(domain: &str, error: &ResolveError) -> DnsError {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            DnsError::NxDomain(domain.to_string())
        }
        ResolveErrorKind::NoRecordsFound { .. } => DnsError::NoRecords(domain.to_string()),
        ResolveErrorKind::Timeout => DnsError::Timeout(domain.to_string()),
        _ => DnsError::Resolver {
            domain: domain.to_string(),
            message: error.to_string(),
        },
    }
}

/// Filters candidates down to addresses whose domain accepts mail
///
/// Verdicts are memoized per domain for the lifetime of the validator, which
/// the crawl engine scopes to one invocation. Concurrent askers for the same
/// domain share a single lookup.
pub struct DomainValidator {
    resolver: Arc<dyn MxResolver>,
    verdicts: Mutex<HashMap<String, Arc<OnceCell<bool>>>>,
}

impl DomainValidator {
    pub fn new(resolver: Arc<dyn MxResolver>) -> Self {
        Self {
            resolver,
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether a domain has at least one MX record
    pub async fn has_mail_exchange(&self, domain: &str) -> bool {
        let key = domain.to_lowercase();
        let cell = {
            let mut verdicts = self
                .verdicts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(verdicts.entry(key.clone()).or_default())
        };

        *cell
            .get_or_init(|| async {
                match self.resolver.lookup_mx(&key).await {
                    Ok(exchanges) if !exchanges.is_empty() => true,
                    Ok(_) => {
                        tracing::debug!("Rejecting {}: empty MX answer", key);
                        false
                    }
                    Err(e) => {
                        tracing::debug!("Rejecting {}: {}", key, e);
                        false
                    }
                }
            })
            .await
    }

    /// Checks a syntactically valid address
    ///
    /// Bracketed IP literals have no domain to query and are rejected.
    pub async fn is_deliverable(&self, address: &str) -> bool {
        match mail_domain(address) {
            Some(domain) if !domain.starts_with('[') => self.has_mail_exchange(domain).await,
            _ => false,
        }
    }

    /// Validates many candidates concurrently
    ///
    /// Each lookup holds a permit from `permits`, the same semaphore that caps
    /// fetches, so DNS traffic counts against the crawl's concurrency limit.
    pub async fn filter_deliverable<I>(
        &self,
        candidates: I,
        permits: &Semaphore,
        concurrency: usize,
    ) -> BTreeSet<String>
    where
        I: IntoIterator<Item = String>,
    {
        stream::iter(candidates)
            .map(|candidate| async move {
                let _permit = permits.acquire().await.ok()?;
                if self.is_deliverable(&candidate).await {
                    Some(candidate)
                } else {
                    None
                }
            })
            .buffer_unordered(concurrency.max(1))
            .filter_map(|verdict| async move { verdict })
            .collect()
            .await
    }

    /// Number of distinct domains looked up so far
    pub fn domains_checked(&self) -> usize {
        self.verdicts
            .lock()
            .map(|verdicts| verdicts.len())
            .unwrap_or(0)
    }
}

/// Resolver answering from a fixed table; unknown domains are NXDOMAIN
#[derive(Debug, Default, Clone)]
pub struct StaticMxResolver {
    records: HashMap<String, Vec<String>>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl StaticMxResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an MX answer for a domain
    pub fn with_mx(mut self, domain: &str, exchange: &str) -> Self {
        self.records
            .entry(domain.to_lowercase())
            .or_default()
            .push(exchange.to_string());
        self
    }

    /// Domains queried so far, in order
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .map(|lookups| lookups.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MxResolver for StaticMxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(domain.to_string());
        }
        self.records
            .get(&domain.to_lowercase())
            .cloned()
            .ok_or_else(|| DnsError::NxDomain(domain.to_string()))
    }
}
