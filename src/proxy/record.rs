//! Proxy identities and health records

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Protocol spoken by a forward proxy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    #[default]
    Http,
    Socks5,
}

impl ProxyProtocol {
    /// URL scheme used when handing the proxy to the HTTP client
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Socks5 => "socks5",
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        self.scheme()
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Self::Http),
            "socks5" => Some(Self::Socks5),
            _ => None,
        }
    }
}

/// How much a proxy reveals about the client behind it
///
/// Ordered from least to most private, so `a >= min` reads as "at least as
/// anonymous as `min`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anonymity {
    /// Forwards the client's real address
    Transparent,
    /// Announces itself as a proxy but hides the client
    Anonymous,
    /// Indistinguishable from a direct connection
    Elite,
}

impl Anonymity {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Anonymous => "anonymous",
            Self::Elite => "elite",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "transparent" => Some(Self::Transparent),
            "anonymous" => Some(Self::Anonymous),
            "elite" => Some(Self::Elite),
            _ => None,
        }
    }

    /// Numeric level used for threshold comparisons in SQL
    pub fn rank(&self) -> i64 {
        match self {
            Self::Transparent => 0,
            Self::Anonymous => 1,
            Self::Elite => 2,
        }
    }
}

impl fmt::Display for Anonymity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A proxy's identity: `host:port`, plus the protocol it speaks
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    pub protocol: ProxyProtocol,
    pub host: String,
    pub port: u16,
}

impl ProxyEndpoint {
    pub fn new(protocol: ProxyProtocol, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
        }
    }

    /// The `host:port` identity used as the storage key
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Proxy URL understood by `reqwest::Proxy`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Persisted health of one proxy
///
/// Counters only grow and `successes <= attempts` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRecord {
    pub endpoint: ProxyEndpoint,
    pub successes: u64,
    pub attempts: u64,
    /// Latency of the most recent successful probe
    pub latency: Option<Duration>,
    pub anonymity: Option<Anonymity>,
    /// Time of the most recent successful probe
    pub last_checked: Option<DateTime<Utc>>,
}

impl ProxyRecord {
    /// Successes over attempts; zero when the proxy was never probed
    pub fn success_ratio(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    /// A proxy is vetted once at least one probe through it succeeded
    pub fn is_vetted(&self) -> bool {
        self.attempts > 0 && self.successes > 0
    }
}

/// Result of probing a proxy once
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    Success {
        latency: Duration,
        anonymity: Anonymity,
    },
    Failure,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Selection criteria for ranked proxy snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxyQuery {
    /// Weakest acceptable anonymity
    pub min_anonymity: Anonymity,
    /// Slowest acceptable measured latency (inclusive)
    pub max_latency: Duration,
}

impl Default for ProxyQuery {
    fn default() -> Self {
        Self {
            min_anonymity: Anonymity::Anonymous,
            max_latency: Duration::from_secs(5),
        }
    }
}
