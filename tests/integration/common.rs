//! Shared fixtures for the integration tests

use email_harvester::config::Config;
use email_harvester::email::StaticMxResolver;
use email_harvester::proxy::ProxyHealthStore;
use email_harvester::Harvester;
use std::sync::Arc;

/// Configuration tuned for fast tests: short timeouts and backoff
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.max_depth = 2;
    config.crawler.max_concurrency = 4;
    config.crawler.request_timeout_secs = 5;
    config.crawler.max_attempts = 3;
    config.crawler.retry_base_delay_ms = 10;
    config.crawler.retry_max_delay_ms = 50;
    config.user_agent.agents = vec!["HarvesterTest/1.0".to_string()];
    config.proxy.ip_echo_url = None;
    config.proxy.probe_timeout_secs = 2;
    config
}

/// Resolver that only knows `a.test`
pub fn resolver() -> Arc<StaticMxResolver> {
    Arc::new(StaticMxResolver::new().with_mx("a.test", "mx.a.test"))
}

/// Harvester with the fake resolver and a private in-memory proxy store
pub fn harvester(config: Config) -> Harvester {
    let store = ProxyHealthStore::open_in_memory().expect("Failed to open proxy store");
    Harvester::builder(config)
        .resolver(resolver())
        .proxy_store(Arc::new(store))
        .build()
}

/// Normalized form of a mock server URI plus `path`
pub fn page_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
