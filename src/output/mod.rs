//! Output module for presenting harvest results
//!
//! This module handles:
//! - Rendering a crawl report (emails, then per-URL status) for the console
//! - Summarizing failures by kind
//! - Displaying proxy pool statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, render_statistics, ProxyStatistics};

use crate::crawler::{CrawlReport, FetchErrorKind};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Counts failed URLs per error kind, most frequent first
pub fn error_summary(report: &CrawlReport) -> Vec<(FetchErrorKind, usize)> {
    let mut counts: BTreeMap<String, (FetchErrorKind, usize)> = BTreeMap::new();
    for kind in report.per_url_status.values().filter_map(|s| s.error_kind()) {
        counts.entry(kind.to_string()).or_insert((kind, 0)).1 += 1;
    }

    let mut summary: Vec<_> = counts.into_values().collect();
    summary.sort_by(|a, b| b.1.cmp(&a.1));
    summary
}

/// Renders a report as plain text
///
/// Emails come first, one per line, so the output can be piped. The status
/// section follows, separated by a blank line.
pub fn render_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    for email in &report.emails {
        let _ = writeln!(out, "{}", email);
    }
    if report.emails.is_empty() {
        let _ = writeln!(out, "(no emails found)");
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "=== URL Status ({} ok, {} failed) ===",
        report.ok_count(),
        report.failed_count()
    );
    for (url, status) in &report.per_url_status {
        let _ = writeln!(out, "  {} {}", status, url);
    }

    let errors = error_summary(report);
    if !errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Error Summary:");
        for (kind, count) in errors {
            let _ = writeln!(out, "  {}: {}", kind, count);
        }
    }

    out
}

/// Prints a report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", render_report(report));
}
