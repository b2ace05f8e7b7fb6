//! Email address handling
//!
//! This module turns page bodies into validated addresses:
//! - Candidate extraction with a pragmatic RFC 5322 pattern
//! - A stricter whole-string syntactic check
//! - MX-record validation of the address domain

mod extract;
mod validate;

pub use extract::{
    extract_emails, extract_emails_from_bytes, is_valid_email, mail_domain, normalize_email,
};
pub use validate::{DnsError, DnsMxResolver, DomainValidator, MxResolver, StaticMxResolver};
