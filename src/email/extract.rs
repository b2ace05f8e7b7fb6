//! Address extraction and syntactic validation
//!
//! Both operations share one pattern: a pragmatic subset of RFC 5322 with a
//! dot-atom or quoted local part and a dotted hostname or bracketed IPv4
//! literal. Extraction searches for it anywhere in a page; validation requires
//! it to span the whole candidate.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::BTreeSet;

const LOCAL_PART: &str = r##"(?:[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*|"(?:[\x01-\x09\x0b\x0c\x0e-\x21\x23-\x5b\x5d-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")"##;

const DOMAIN_PART: &str = r"(?:(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?|\[(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\])";

/// Unanchored pattern used to find candidates in page bodies
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?i-u){}@{}", LOCAL_PART, DOMAIN_PART)).expect("Invalid email regex")
});

/// The same pattern anchored to the whole input
static EMAIL_EXACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i-u)\A{}@{}\z", LOCAL_PART, DOMAIN_PART))
        .expect("Invalid anchored email regex")
});

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_LABEL_LEN: usize = 63;

/// Finds every distinct address candidate in a piece of text
///
/// Matching is case-insensitive and has no side effects. The result is a
/// set, so running extraction over its own output yields the same set.
///
/// # Examples
///
/// ```
/// use email_harvester::email::extract_emails;
///
/// let found = extract_emails("Write to <a href=\"mailto:sales@example.com\">sales@example.com</a>.");
/// assert_eq!(found.len(), 1);
/// assert!(found.contains("sales@example.com"));
/// ```
pub fn extract_emails(text: &str) -> BTreeSet<String> {
    extract_emails_from_bytes(text.as_bytes())
}

/// Finds address candidates in raw bytes
///
/// Bytes that are not valid UTF-8 never match, so undecodable input simply
/// yields fewer candidates.
pub fn extract_emails_from_bytes(bytes: &[u8]) -> BTreeSet<String> {
    EMAIL_PATTERN
        .find_iter(bytes)
        .filter_map(|m| std::str::from_utf8(m.as_bytes()).ok())
        .map(str::to_string)
        .collect()
}

/// Checks that a candidate is an address and nothing else
///
/// Applies the extraction pattern anchored to the full string, which rejects
/// artifacts such as trailing punctuation or embedded whitespace, plus the
/// RFC 5321 length limits. Hostnames must end in an alphabetic top-level
/// label; this drops version strings and file names such as `icon@2.0.1`.
pub fn is_valid_email(candidate: &str) -> bool {
    if candidate.len() > MAX_ADDRESS_LEN || !EMAIL_EXACT.is_match(candidate.as_bytes()) {
        return false;
    }

    let Some((local, domain)) = candidate.rsplit_once('@') else {
        return false;
    };

    if local.len() > MAX_LOCAL_LEN {
        return false;
    }

    if domain.starts_with('[') {
        return true;
    }

    if domain.split('.').any(|label| label.len() > MAX_LABEL_LEN) {
        return false;
    }

    domain
        .rsplit('.')
        .next()
        .map(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false)
}

/// Returns the domain portion of an address (after the rightmost `@`)
pub fn mail_domain(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// Canonical form used for deduplicating results
pub fn normalize_email(address: &str) -> String {
    address.trim().to_lowercase()
}
