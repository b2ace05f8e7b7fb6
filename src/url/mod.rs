//! URL handling module
//!
//! Seed and link normalization (the identity used by the visited set and the
//! result cache) and same-site comparison for the link extractor.

mod domain;
mod normalize;

pub use domain::{extract_domain, same_site, site_key};
pub use normalize::{normalize_seed, normalize_url};
