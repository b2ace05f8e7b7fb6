use crate::config::types::{Config, CrawlerConfig, DnsConfig, ProxyConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on the concurrency cap
pub const MAX_CONCURRENCY: usize = 256;

/// Upper bound on attempts per fetch
pub const MAX_ATTEMPTS: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agents(&config.user_agent.agents)?;
    validate_dns_config(&config.dns)?;
    validate_proxy_config(&config.proxy)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_depth < 0 {
        return Err(ConfigError::Validation(format!(
            "max_depth must be >= 0, got {}",
            config.max_depth
        )));
    }

    if config.max_concurrency < 1 || config.max_concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.max_concurrency
        )));
    }

    if let Some(rps) = config.requests_per_second {
        if !rps.is_finite() || rps <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "requests_per_second must be a positive number, got {}",
                rps
            )));
        }
    }

    if config.links_per_page < 1 {
        return Err(ConfigError::Validation(
            "links_per_page must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > MAX_ATTEMPTS {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and {}, got {}",
            MAX_ATTEMPTS, config.max_attempts
        )));
    }

    if config.retry_max_delay_ms < config.retry_base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry_max_delay_ms ({}) must be >= retry_base_delay_ms ({})",
            config.retry_max_delay_ms, config.retry_base_delay_ms
        )));
    }

    if config.crawl_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "crawl_timeout_secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the user agent rotation pool
fn validate_user_agents(agents: &[String]) -> Result<(), ConfigError> {
    if agents.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent pool cannot be empty".to_string(),
        ));
    }

    if agents.iter().any(|agent| agent.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agent strings cannot be blank".to_string(),
        ));
    }

    Ok(())
}

fn validate_dns_config(config: &DnsConfig) -> Result<(), ConfigError> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "dns timeout_ms must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates proxy configuration
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "proxy database_path cannot be empty".to_string(),
        ));
    }

    validate_http_url("probe_url", &config.probe_url)?;

    if let Some(echo) = &config.ip_echo_url {
        validate_http_url("ip_echo_url", echo)?;
    }

    for source in &config.sources {
        validate_http_url("proxy source", &source.url)?;
    }

    if config.probe_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "probe_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.probe_concurrency < 1 {
        return Err(ConfigError::Validation(
            "probe_concurrency must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
