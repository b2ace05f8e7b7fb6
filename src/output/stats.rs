//! Proxy pool statistics
//!
//! This module provides functionality for extracting and displaying
//! proxy health statistics from the health store.

use crate::proxy::ProxyHealthStore;
use crate::storage::{RefreshRunRecord, StorageResult};
use std::fmt::Write;

/// Proxy pool statistics summary
#[derive(Debug, Clone)]
pub struct ProxyStatistics {
    /// Every proxy ever probed
    pub total_proxies: usize,

    /// Proxies with at least one successful probe
    pub vetted_proxies: usize,

    /// Most recent acquisition run, if any
    pub latest_refresh: Option<RefreshRunRecord>,
}

/// Loads statistics from the health store
///
/// # Arguments
///
/// * `store` - The proxy health store to query
///
/// # Returns
///
/// * `Ok(ProxyStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(store: &ProxyHealthStore) -> StorageResult<ProxyStatistics> {
    Ok(ProxyStatistics {
        total_proxies: store.total_count()?,
        vetted_proxies: store.vetted_count()?,
        latest_refresh: store.latest_refresh()?,
    })
}

/// Renders statistics as the text printed by [`print_statistics`]
pub fn render_statistics(stats: &ProxyStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Proxy Statistics ===\n");

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Known proxies: {}", stats.total_proxies);
    let vetted_rate = if stats.total_proxies > 0 {
        (stats.vetted_proxies as f64 / stats.total_proxies as f64) * 100.0
    } else {
        0.0
    };
    let _ = writeln!(
        out,
        "  Vetted proxies: {} ({:.1}%)",
        stats.vetted_proxies, vetted_rate
    );
    let _ = writeln!(out);

    match &stats.latest_refresh {
        Some(run) => {
            let _ = writeln!(out, "Last Refresh (run {}):", run.id);
            let _ = writeln!(out, "  Started: {}", run.started_at);
            match &run.finished_at {
                Some(finished) => {
                    let _ = writeln!(out, "  Finished: {}", finished);
                }
                None => {
                    let _ = writeln!(out, "  Finished: (incomplete)");
                }
            }
            let _ = writeln!(out, "  Candidates fetched: {}", run.fetched);
            let _ = writeln!(out, "  Candidates validated: {}", run.validated);
        }
        None => {
            let _ = writeln!(out, "No proxy refresh has run yet.");
        }
    }

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ProxyStatistics) {
    print!("{}", render_statistics(stats));
}
