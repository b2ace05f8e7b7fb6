//! Integration tests for proxy acquisition and proxied crawling
//!
//! Proxy lists are served by wiremock. The proxy itself is a tiny TCP server
//! that answers every forwarded request from a script, since an HTTP proxy
//! receives absolute-form request lines.

use crate::common::{harvester, resolver, test_config};
use email_harvester::config::ProxySource;
use email_harvester::proxy::{
    Anonymity, ProbeOutcome, ProxyEndpoint, ProxyHealthStore, ProxyProtocol,
};
use email_harvester::{CrawlRequest, FetchErrorKind, Harvester, UrlStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Minimal forward proxy recording the request lines it receives
struct FakeProxy {
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeProxy {
    /// Starts a proxy answering probe URLs with a header echo and anything
    /// else with `page_body`
    async fn start(page_body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake proxy");
        let port = listener.local_addr().expect("No local address").port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let head = String::from_utf8_lossy(&buf).to_string();
                    let request_line = head.lines().next().unwrap_or_default().to_string();
                    log.lock().unwrap().push(request_line.clone());

                    let body = if request_line.contains("/headers") {
                        r#"{"headers": {"Accept": "*/*", "Host": "probe.test"}}"#
                    } else {
                        page_body
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { port, requests }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn proxy_list_source(server: &MockServer) -> ProxySource {
    ProxySource {
        url: format!("{}/proxies.txt", server.uri()),
        protocol: ProxyProtocol::Http,
    }
}

async fn serve_list(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/proxies.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn harvester_with_store(config: email_harvester::Config, store: Arc<ProxyHealthStore>) -> Harvester {
    Harvester::builder(config)
        .resolver(resolver())
        .proxy_store(store)
        .build()
}

#[tokio::test]
async fn test_refresh_records_dead_proxy_as_failure() {
    let list_server = MockServer::start().await;
    serve_list(&list_server, "127.0.0.1:1\n127.0.0.1:1\n".to_string()).await;

    let mut config = test_config();
    config.proxy.sources = vec![proxy_list_source(&list_server)];

    let store = Arc::new(ProxyHealthStore::open_in_memory().expect("Failed to open store"));
    let harvester = harvester_with_store(config, Arc::clone(&store));

    let summary = harvester.refresh_proxies().await.expect("refresh failed");
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.validated, 0);

    let endpoint = ProxyEndpoint::new(ProxyProtocol::Http, "127.0.0.1", 1);
    let record = store.get(&endpoint).expect("query failed").expect("record missing");
    assert_eq!(record.attempts, 1);
    assert_eq!(record.successes, 0);
    assert!(record.last_checked.is_none());
    assert_eq!(harvester.vetted_proxy_count().expect("count failed"), 0);

    let run = harvester
        .latest_proxy_refresh()
        .expect("query failed")
        .expect("no refresh run");
    assert!(run.is_finished());
    assert_eq!((run.fetched, run.validated), (1, 0));
}

#[tokio::test]
async fn test_refresh_validates_working_proxy() {
    let proxy = FakeProxy::start("unused").await;
    let list_server = MockServer::start().await;
    serve_list(&list_server, format!("# fresh list\n127.0.0.1:{}\n", proxy.port)).await;

    let mut config = test_config();
    config.proxy.sources = vec![proxy_list_source(&list_server)];
    config.proxy.probe_url = "http://probe.test/headers".to_string();

    let store = Arc::new(ProxyHealthStore::open_in_memory().expect("Failed to open store"));
    let harvester = harvester_with_store(config, Arc::clone(&store));

    let summary = harvester.refresh_proxies().await.expect("refresh failed");
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.validated, 1);

    let endpoint = ProxyEndpoint::new(ProxyProtocol::Http, "127.0.0.1", proxy.port);
    let record = store.get(&endpoint).expect("query failed").expect("record missing");
    assert_eq!((record.successes, record.attempts), (1, 1));
    assert_eq!(record.anonymity, Some(Anonymity::Elite));
    assert!(record.latency.is_some());
    assert!(record.last_checked.is_some());

    assert!(proxy
        .requests()
        .iter()
        .any(|line| line.starts_with("GET http://probe.test/headers")));
}

#[tokio::test]
async fn test_unreachable_source_is_skipped() {
    let list_server = MockServer::start().await;
    serve_list(&list_server, "127.0.0.1:1\n".to_string()).await;

    let mut config = test_config();
    config.proxy.sources = vec![
        ProxySource {
            url: "http://127.0.0.1:1/list.txt".to_string(),
            protocol: ProxyProtocol::Http,
        },
        proxy_list_source(&list_server),
    ];

    let summary = harvester(config)
        .refresh_proxies()
        .await
        .expect("refresh failed");

    assert_eq!(summary.fetched, 1);
}

#[tokio::test]
async fn test_crawl_through_vetted_proxy() {
    let proxy = FakeProxy::start("<p>Reach us at sales@a.test</p>").await;

    let store = Arc::new(ProxyHealthStore::open_in_memory().expect("Failed to open store"));
    let endpoint = ProxyEndpoint::new(ProxyProtocol::Http, "127.0.0.1", proxy.port);
    store
        .record_probe(
            &endpoint,
            &ProbeOutcome::Success {
                latency: Duration::from_millis(40),
                anonymity: Anonymity::Elite,
            },
        )
        .expect("record failed");

    let harvester = harvester_with_store(test_config(), store);
    let report = harvester
        .harvest(
            &CrawlRequest::new(["http://site.test"])
                .max_depth(0)
                .use_proxies(true),
        )
        .await
        .expect("harvest failed");

    assert_eq!(report.emails, vec!["sales@a.test"]);
    assert_eq!(report.status_of("http://site.test/"), Some(UrlStatus::Ok));
    assert!(proxy
        .requests()
        .iter()
        .any(|line| line.starts_with("GET http://site.test/")));
}

#[tokio::test]
async fn test_failing_proxy_is_blacklisted_for_the_crawl() {
    let store = Arc::new(ProxyHealthStore::open_in_memory().expect("Failed to open store"));
    let dead = ProxyEndpoint::new(ProxyProtocol::Http, "127.0.0.1", 1);
    store
        .record_probe(
            &dead,
            &ProbeOutcome::Success {
                latency: Duration::from_millis(40),
                anonymity: Anonymity::Elite,
            },
        )
        .expect("record failed");

    let harvester = harvester_with_store(test_config(), Arc::clone(&store));
    let report = harvester
        .harvest(
            &CrawlRequest::new(["http://site.test"])
                .max_depth(0)
                .use_proxies(true),
        )
        .await
        .expect("harvest failed");

    assert!(report.emails.is_empty());
    assert_eq!(
        report.status_of("http://site.test/"),
        Some(UrlStatus::Failed(FetchErrorKind::NoProxyAvailable))
    );

    // The blacklist is per crawl; persisted counters are untouched
    let record = store.get(&dead).expect("query failed").expect("record missing");
    assert_eq!((record.successes, record.attempts), (1, 1));
}

#[tokio::test]
async fn test_proxy_mode_without_vetted_proxies() {
    let report = harvester(test_config())
        .harvest(
            &CrawlRequest::new(["http://site.test"])
                .max_depth(0)
                .use_proxies(true),
        )
        .await
        .expect("harvest failed");

    assert_eq!(
        report.status_of("http://site.test/"),
        Some(UrlStatus::Failed(FetchErrorKind::NoProxyAvailable))
    );
}
