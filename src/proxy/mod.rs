//! Proxy pool management
//!
//! This module provides:
//! - `ProxyHealthStore`: persisted success/attempt counters, latency and anonymity
//! - `ProxyAcquirer`: pulls candidates from list sources and probes them
//! - `ProxyRotation`: per-crawl round-robin selection with a blacklist

mod acquirer;
mod record;
mod rotation;
mod store;

pub use acquirer::{classify_anonymity, parse_proxy_list, ProxyAcquirer, RefreshSummary};
pub use record::{Anonymity, ProbeOutcome, ProxyEndpoint, ProxyProtocol, ProxyQuery, ProxyRecord};
pub use rotation::{proxied_client, ProxyRotation};
pub use store::{Blacklist, ProxyHealthStore};
