//! Integration tests for fetching: retries, error classification and
//! user agent rotation

use crate::common::{harvester, page_url, test_config};
use email_harvester::crawler::{FetchError, HttpFetcher, Pacer, PageFetcher};
use email_harvester::{CrawlRequest, FetchErrorKind, UrlStatus};
use std::time::{Duration, Instant};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_server_error_is_retried_then_reported() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([base.clone()]).max_depth(0))
        .await
        .expect("harvest failed");

    assert!(report.emails.is_empty());
    assert_eq!(
        report.status_of(&page_url(&base, "/")),
        Some(UrlStatus::Failed(FetchErrorKind::FetchHttpError(500)))
    );
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([base.clone()]).max_depth(0))
        .await
        .expect("harvest failed");

    assert_eq!(
        report.status_of(&page_url(&base, "/")),
        Some(UrlStatus::Failed(FetchErrorKind::FetchHttpError(403)))
    );
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x@a.test"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([mock_server.uri()]).max_depth(0))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["x@a.test"]);
    assert_eq!(report.ok_count(), 1);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("x@a.test")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.crawler.request_timeout_secs = 1;
    config.crawler.max_attempts = 1;

    let report = harvester(config)
        .harvest(&CrawlRequest::new([base.clone()]).max_depth(0))
        .await
        .expect("harvest failed");

    assert!(report.emails.is_empty());
    assert_eq!(
        report.status_of(&page_url(&base, "/")),
        Some(UrlStatus::Failed(FetchErrorKind::FetchTimeout))
    );
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let mut config = test_config();
    config.crawler.max_attempts = 2;

    // Nothing listens on port 1
    let report = harvester(config)
        .harvest(&CrawlRequest::new(["http://127.0.0.1:1"]).max_depth(0))
        .await
        .expect("harvest failed");

    assert_eq!(
        report.status_of("http://127.0.0.1:1/"),
        Some(UrlStatus::Failed(FetchErrorKind::FetchConnectionError))
    );
}

#[tokio::test]
async fn test_user_agent_rotates_between_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "agent-one"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "agent-two"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.user_agent.agents = vec!["agent-one".to_string(), "agent-two".to_string()];

    let fetcher = HttpFetcher::direct(&config).expect("Failed to build fetcher");
    let url = Url::parse(&mock_server.uri()).expect("Failed to parse URL");
    let page = fetcher
        .fetch(&url, &Pacer::unpaced())
        .await
        .expect("fetch failed");

    assert_eq!(page.status_code, 200);
    assert_eq!(page.body, "ok");
}

#[tokio::test]
async fn test_redirect_target_anchors_links() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/home/", base).as_str()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="staff">Staff</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_string("staff@a.test"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([base]).max_depth(1))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["staff@a.test"]);
}

#[tokio::test]
async fn test_rate_limit_spaces_out_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.crawler.retry_base_delay_ms = 1;
    config.crawler.retry_max_delay_ms = 1;

    let fetcher = HttpFetcher::direct(&config).expect("Failed to build fetcher");
    let url = Url::parse(&mock_server.uri()).expect("Failed to parse URL");
    let pacer = Pacer::new(Some(10.0));

    let started = Instant::now();
    let result = fetcher.fetch(&url, &pacer).await;

    // Three attempts at 10/s: the second and third each wait ~100ms
    assert!(started.elapsed() >= Duration::from_millis(180));
    assert_eq!(result.unwrap_err(), FetchError::Http { status: 500 });
}
