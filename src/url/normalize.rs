use crate::UrlError;
use url::Url;

/// Tracking query parameters dropped during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a URL into the identity used by the visited set and cache keys
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Lowercase the host
/// 4. Normalize the path:
///    - Remove dot segments (`.` and `..`) and empty segments
///    - Remove trailing slash (except for root `/`)
///    - Empty path becomes `/`
/// 5. Remove the fragment
/// 6. Remove tracking query parameters and sort the rest
/// 7. Remove an empty query string
///
/// The scheme and any `www.` prefix are kept: they change what is fetched.
///
/// # Examples
///
/// ```
/// use email_harvester::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.COM/team/#staff").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/team");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
            }
        }
        _ => return Err(UrlError::MissingDomain),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            // Re-encode so reserved characters in values keep their meaning
            url.query_pairs_mut().clear().extend_pairs(&params);
        }
    }

    Ok(url)
}

/// Normalizes a caller-supplied seed
///
/// Seeds are not guaranteed to carry a scheme; `https://` is prepended when
/// one is missing, then the result goes through [`normalize_url`].
///
/// ```
/// use email_harvester::url::normalize_seed;
///
/// assert_eq!(normalize_seed("example.com").unwrap().as_str(), "https://example.com/");
/// assert_eq!(normalize_seed("http://example.com").unwrap().as_str(), "http://example.com/");
/// ```
pub fn normalize_seed(seed: &str) -> Result<Url, UrlError> {
    let trimmed = seed.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("seed URL is empty".to_string()));
    }

    if trimmed.contains("://") {
        normalize_url(trimmed)
    } else {
        normalize_url(&format!("https://{}", trimmed))
    }
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
