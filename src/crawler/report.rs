//! Crawl results handed back to callers

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why a URL contributed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    FetchTimeout,
    FetchConnectionError,
    FetchHttpError(u16),
    NoProxyAvailable,
    /// The invocation was cancelled or hit its deadline first
    Cancelled,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchTimeout => write!(f, "timeout"),
            Self::FetchConnectionError => write!(f, "connection error"),
            Self::FetchHttpError(status) => write!(f, "HTTP {}", status),
            Self::NoProxyAvailable => write!(f, "no proxy available"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStatus {
    Ok,
    Failed(FetchErrorKind),
}

impl UrlStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn error_kind(&self) -> Option<FetchErrorKind> {
        match self {
            Self::Ok => None,
            Self::Failed(kind) => Some(*kind),
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Failed(kind) => write!(f, "failed ({})", kind),
        }
    }
}

/// Everything one harvest produced
///
/// `emails` is sorted and free of duplicates. Every URL the crawl admitted
/// has an entry in `per_url_status`, including ones that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub emails: Vec<String>,
    pub per_url_status: BTreeMap<String, UrlStatus>,
}

impl CrawlReport {
    pub fn new(emails: BTreeSet<String>, per_url_status: BTreeMap<String, UrlStatus>) -> Self {
        Self {
            emails: emails.into_iter().collect(),
            per_url_status,
        }
    }

    /// Folds another report into this one
    ///
    /// Emails are unioned. A URL present in both keeps a successful status
    /// over a failed one.
    pub fn merge(&mut self, other: CrawlReport) {
        let mut emails: BTreeSet<String> = std::mem::take(&mut self.emails).into_iter().collect();
        emails.extend(other.emails);
        self.emails = emails.into_iter().collect();

        for (url, status) in other.per_url_status {
            match self.per_url_status.get(&url) {
                Some(UrlStatus::Ok) => {}
                _ => {
                    self.per_url_status.insert(url, status);
                }
            }
        }
    }

    pub fn ok_count(&self) -> usize {
        self.per_url_status.values().filter(|s| s.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.per_url_status.len() - self.ok_count()
    }

    pub fn status_of(&self, url: &str) -> Option<UrlStatus> {
        self.per_url_status.get(url).copied()
    }
}
