//! Integration tests for the crawl cycle
//!
//! These tests use wiremock to create mock HTTP servers and run full
//! harvests end-to-end through the real fetcher.

use crate::common::{harvester, page_url, test_config};
use email_harvester::{CrawlRequest, FetchErrorKind, HarvestError, UrlStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

#[tokio::test]
async fn test_harvest_follows_same_site_links() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<p>Write to <a href="mailto:x@a.test">x@a.test</a></p>
               <a href="/page2">Next</a>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("<p>Or try y@a.test</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([base.clone()]).max_depth(1))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["x@a.test", "y@a.test"]);
    assert_eq!(report.status_of(&page_url(&base, "/")), Some(UrlStatus::Ok));
    assert_eq!(report.status_of(&page_url(&base, "/page2")), Some(UrlStatus::Ok));
}

#[tokio::test]
async fn test_depth_zero_fetches_only_seed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"x@a.test <a href="/page2">Next</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("y@a.test"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([mock_server.uri()]).max_depth(0))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["x@a.test"]);
    assert_eq!(report.per_url_status.len(), 1);
}

#[tokio::test]
async fn test_negative_depth_makes_no_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(html("x@a.test"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = harvester(test_config())
        .harvest(&CrawlRequest::new([mock_server.uri()]).max_depth(-1))
        .await;

    assert!(matches!(result, Err(HarvestError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_other_sites_are_not_followed() {
    let mock_server = MockServer::start().await;
    let other_server = MockServer::start().await;

    // Same port space, different host name
    let other = other_server.uri().replace("127.0.0.1", "localhost");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            r#"x@a.test <a href="{}/team">Partner</a>"#,
            other
        )))
        .mount(&mock_server)
        .await;

    Mock::given(any())
        .respond_with(html("stolen@a.test"))
        .expect(0)
        .mount(&other_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([mock_server.uri()]).max_depth(2))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["x@a.test"]);
}

#[tokio::test]
async fn test_shared_page_is_fetched_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/left">L</a><a href="/right">R</a><a href="/contact">C</a>"#,
        ))
        .mount(&mock_server)
        .await;

    for side in ["/left", "/right"] {
        Mock::given(method("GET"))
            .and(path(side))
            .respond_with(
                html(r#"<a href="/contact">Contact</a><a href="/">Home</a>"#)
                    .set_delay(Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html("office@a.test"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([mock_server.uri()]).max_depth(2))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["office@a.test"]);
    assert_eq!(report.per_url_status.len(), 4);
}

#[tokio::test]
async fn test_only_mx_backed_addresses_are_kept() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            "Sales@A.test support@nowhere.test logo@2x.png not-an-email@",
        ))
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([mock_server.uri()]).max_depth(0))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["sales@a.test"]);
}

#[tokio::test]
async fn test_failed_link_does_not_stop_siblings() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/missing">Gone</a><a href="/about">About</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("hello@a.test"))
        .mount(&mock_server)
        .await;

    let report = harvester(test_config())
        .harvest(&CrawlRequest::new([base.clone()]).max_depth(1))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["hello@a.test"]);
    assert_eq!(
        report.status_of(&page_url(&base, "/missing")),
        Some(UrlStatus::Failed(FetchErrorKind::FetchHttpError(404)))
    );
}

#[tokio::test]
async fn test_cached_seed_is_not_refetched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("x@a.test"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harvester = harvester(test_config());
    let request = CrawlRequest::new([mock_server.uri()]).max_depth(0);

    let first = harvester.harvest(&request).await.expect("harvest failed");
    assert!(harvester.is_cached(&mock_server.uri()));
    let second = harvester.harvest(&request).await.expect("harvest failed");

    assert_eq!(first, second);
    assert_eq!(harvester.get_cached(&mock_server.uri()), Some(first));
}

#[tokio::test]
async fn test_expired_cache_entry_is_refetched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("x@a.test"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let harvester = harvester(test_config());
    let request = CrawlRequest::new([mock_server.uri()])
        .max_depth(0)
        .cache_ttl(Duration::from_millis(50));

    harvester.harvest(&request).await.expect("harvest failed");
    tokio::time::sleep(Duration::from_millis(100)).await;
    harvester.harvest(&request).await.expect("harvest failed");
}

#[tokio::test]
async fn test_cancelled_harvest_returns_partial_results() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"x@a.test <a href="/slow">Slow</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("y@a.test").set_delay(Duration::from_secs(4)))
        .mount(&mock_server)
        .await;

    let harvester = harvester(test_config());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let request = CrawlRequest::new([base.clone()]).max_depth(1);
    let report = harvester
        .harvest_with_cancel(&request, cancel)
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["x@a.test"]);
    assert_eq!(
        report.status_of(&page_url(&base, "/slow")),
        Some(UrlStatus::Failed(FetchErrorKind::Cancelled))
    );
    assert!(!harvester.is_cached(&base));
}

#[tokio::test]
async fn test_multiple_seeds_merge_into_one_report() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("one@a.test"))
        .mount(&first)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("two@a.test one@a.test"))
        .mount(&second)
        .await;

    let harvester = harvester(test_config());
    let report = harvester
        .harvest(&CrawlRequest::new([first.uri(), second.uri()]).max_depth(0))
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["one@a.test", "two@a.test"]);
    assert_eq!(report.per_url_status.len(), 2);
    assert!(harvester.is_cached(&first.uri()));
    assert!(harvester.is_cached(&second.uri()));
}
