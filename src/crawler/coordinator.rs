//! Crawler coordinator - main crawl orchestration logic
//!
//! One `Coordinator` drives one crawl invocation:
//! - Seeds enter at depth 0 and every admitted URL becomes a task
//! - A task waits for a scheduler slot, fetches, then mines the body for
//!   emails (MX-validated concurrently) and, below the depth limit, for links
//! - Discovered links are admitted through the visited set at depth + 1,
//!   so each URL is fetched at most once per invocation
//! - The invocation ends when every task has finished, or early on
//!   cancellation or deadline, keeping whatever already completed
//!
//! Fetch failures are recorded per URL and never stop sibling or descendant
//! tasks.

use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::extract_links;
use crate::crawler::report::{CrawlReport, FetchErrorKind, UrlStatus};
use crate::crawler::scheduler::Scheduler;
use crate::email::{
    extract_emails, is_valid_email, normalize_email, DomainValidator, MxResolver,
};
use crate::state::{PageState, VisitedSet};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Limits applied to one crawl invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOptions {
    /// Deepest level fetched; seeds are depth 0
    pub max_depth: u32,
    /// Same-site links followed per page
    pub links_per_page: usize,
    /// Concurrent fetches and MX lookups
    pub concurrency: usize,
    /// Advisory dispatch rate
    pub requests_per_second: Option<f64>,
    /// Wall-clock budget for the whole invocation
    pub deadline: Option<Duration>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            links_per_page: crate::crawler::DEFAULT_LINKS_PER_PAGE,
            concurrency: 10,
            requests_per_second: None,
            deadline: None,
        }
    }
}

/// A URL waiting to be fetched
#[derive(Debug, Clone)]
struct PageTask {
    /// Index of the seed whose traversal reached this URL
    seed: usize,
    url: Url,
    depth: u32,
}

/// What a finished task hands back to the loop
#[derive(Debug)]
struct PageOutcome {
    task: PageTask,
    status: UrlStatus,
    emails: BTreeSet<String>,
    links: Vec<Url>,
}

/// State shared by every task of one invocation
struct CrawlContext {
    fetcher: Arc<dyn PageFetcher>,
    validator: DomainValidator,
    scheduler: Scheduler,
    visited: VisitedSet,
    seeds: Vec<Url>,
    max_depth: u32,
    links_per_page: usize,
}

/// Per-seed accumulation of results
#[derive(Debug, Default)]
struct SeedResults {
    emails: BTreeSet<String>,
    statuses: BTreeMap<String, UrlStatus>,
    /// Set when a link led to a page another seed had already admitted
    overlapped: bool,
}

impl SeedResults {
    fn into_report(self, seed: Url) -> SeedReport {
        let cancelled = self
            .statuses
            .values()
            .any(|status| *status == UrlStatus::Failed(FetchErrorKind::Cancelled));

        SeedReport {
            seed,
            complete: !self.overlapped && !cancelled,
            report: CrawlReport::new(self.emails, self.statuses),
        }
    }
}

/// One seed's share of a crawl invocation
#[derive(Debug, Clone, PartialEq)]
pub struct SeedReport {
    pub seed: Url,
    pub report: CrawlReport,
    /// Whether `report` covers everything reachable from `seed`
    ///
    /// False if the invocation was interrupted before this seed finished, or
    /// if part of its traversal was fetched and credited to a different
    /// seed. A standalone crawl of `seed` would find more in either case.
    pub complete: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    fetcher: Arc<dyn PageFetcher>,
    resolver: Arc<dyn MxResolver>,
    options: CrawlOptions,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `fetcher` - How pages are retrieved (direct or proxied)
    /// * `resolver` - MX lookups for domain validation
    /// * `options` - Depth, fan-out and concurrency limits
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        resolver: Arc<dyn MxResolver>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            options,
        }
    }

    /// Crawls outward from every seed and returns one report per seed
    ///
    /// Reports are in seed order. The visited set spans all seeds, so a page
    /// reachable from two seeds is fetched once and credited to whichever
    /// seed's traversal admitted it first; the other seed's report is then
    /// marked incomplete.
    ///
    /// If `cancel` fires or the deadline passes, in-flight tasks are aborted,
    /// their URLs are reported as `Cancelled`, and everything that already
    /// completed is still returned.
    pub async fn run(self, seeds: Vec<Url>, cancel: CancellationToken) -> Vec<SeedReport> {
        let started = Instant::now();
        let ctx = Arc::new(CrawlContext {
            fetcher: self.fetcher,
            validator: DomainValidator::new(self.resolver),
            scheduler: Scheduler::new(self.options.concurrency, self.options.requests_per_second),
            visited: VisitedSet::new(),
            seeds: seeds.clone(),
            max_depth: self.options.max_depth,
            links_per_page: self.options.links_per_page,
        });

        tracing::info!(
            "Starting crawl of {} seeds (max depth {}, concurrency {})",
            seeds.len(),
            ctx.max_depth,
            ctx.scheduler.concurrency()
        );

        let mut results: Vec<SeedResults> = seeds.iter().map(|_| SeedResults::default()).collect();
        let mut origins: HashMap<String, usize> = HashMap::new();
        let mut tasks = JoinSet::new();

        for (index, seed) in seeds.iter().enumerate() {
            admit(&ctx, &mut tasks, &mut origins, &mut results, PageTask {
                seed: index,
                url: seed.clone(),
                depth: 0,
            });
        }

        let deadline = self.options.deadline;
        let expired = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut pages_done = 0usize;
        let interrupted = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::warn!("Crawl cancelled with {} pages in flight", tasks.len());
                    break true;
                }
                _ = &mut expired => {
                    tracing::warn!(
                        "Crawl deadline reached with {} pages in flight",
                        tasks.len()
                    );
                    break true;
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else {
                        break false;
                    };

                    let outcome = match joined {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!("Page task failed: {}", e);
                            continue;
                        }
                    };

                    pages_done += 1;
                    let child_depth = outcome.task.depth + 1;
                    if child_depth <= ctx.max_depth {
                        for link in &outcome.links {
                            admit(&ctx, &mut tasks, &mut origins, &mut results, PageTask {
                                seed: outcome.task.seed,
                                url: link.clone(),
                                depth: child_depth,
                            });
                        }
                    }

                    let seed = &mut results[outcome.task.seed];
                    seed.emails.extend(outcome.emails);
                    seed.statuses.insert(outcome.task.url.to_string(), outcome.status);
                }
            }
        };

        if interrupted {
            tasks.abort_all();
        }

        // Anything still active was aborted or lost to a panicked task
        for url in ctx.visited.cancel_active() {
            if let Some(&seed) = origins.get(&url) {
                results[seed]
                    .statuses
                    .insert(url, UrlStatus::Failed(FetchErrorKind::Cancelled));
            }
        }

        let reports: Vec<SeedReport> = results
            .into_iter()
            .zip(seeds)
            .map(|(results, seed)| results.into_report(seed))
            .collect();

        tracing::info!(
            "Crawl finished in {:.2}s: {} pages completed, {} URLs admitted, {} emails",
            started.elapsed().as_secs_f64(),
            pages_done,
            ctx.visited.len(),
            reports.iter().map(|r| r.report.emails.len()).sum::<usize>()
        );

        reports
    }
}

/// Admits a URL through the visited set and spawns its task
///
/// A URL already admitted for a different seed marks the current seed as
/// overlapped.
fn admit(
    ctx: &Arc<CrawlContext>,
    tasks: &mut JoinSet<PageOutcome>,
    origins: &mut HashMap<String, usize>,
    results: &mut [SeedResults],
    task: PageTask,
) {
    if task.depth > ctx.max_depth {
        return;
    }

    if !ctx.visited.insert(&task.url) {
        if origins.get(task.url.as_str()) == Some(&task.seed) {
            tracing::trace!("Already visited {}", task.url);
        } else {
            tracing::debug!("{} was already admitted for another seed", task.url);
            results[task.seed].overlapped = true;
        }
        return;
    }

    origins.insert(task.url.to_string(), task.seed);
    tasks.spawn(process_page(Arc::clone(ctx), task));
}

/// Fetches one page and extracts its emails and child links
async fn process_page(ctx: Arc<CrawlContext>, task: PageTask) -> PageOutcome {
    let permit = ctx.scheduler.acquire_fetch_slot().await;
    ctx.visited.transition(&task.url, PageState::Fetching);

    let fetched = ctx.fetcher.fetch(&task.url, ctx.scheduler.pacer()).await;
    drop(permit);

    let page = match fetched {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!("Failed to fetch {} (depth {}): {}", task.url, task.depth, e);
            ctx.visited.transition(&task.url, PageState::Failed);
            return PageOutcome {
                status: UrlStatus::Failed(e.kind()),
                task,
                emails: BTreeSet::new(),
                links: Vec::new(),
            };
        }
    };

    let links = if task.depth < ctx.max_depth {
        extract_links(
            &page.body,
            &page.final_url,
            &ctx.seeds[task.seed],
            ctx.links_per_page,
        )
    } else {
        Vec::new()
    };

    let candidates: BTreeSet<String> = extract_emails(&page.body)
        .into_iter()
        .filter(|candidate| is_valid_email(candidate))
        .map(|candidate| normalize_email(&candidate))
        .collect();
    let candidate_count = candidates.len();

    let emails = ctx
        .validator
        .filter_deliverable(
            candidates,
            ctx.scheduler.permits(),
            ctx.scheduler.concurrency(),
        )
        .await;

    tracing::debug!(
        "Extracted {} ({} of {} candidates kept, {} links) at depth {}",
        task.url,
        emails.len(),
        candidate_count,
        links.len(),
        task.depth
    );
    ctx.visited.transition(&task.url, PageState::Extracted);

    PageOutcome {
        task,
        status: UrlStatus::Ok,
        emails,
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{FetchError, FetchedPage};
    use crate::crawler::scheduler::Pacer;
    use crate::email::StaticMxResolver;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves canned pages and records every fetch
    #[derive(Default)]
    struct ScriptedFetcher {
        pages: HashMap<String, (Duration, String)>,
        log: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (Duration::ZERO, body.to_string()));
            self
        }

        fn slow_page(mut self, url: &str, delay: Duration, body: &str) -> Self {
            self.pages.insert(url.to_string(), (delay, body.to_string()));
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &Url, pacer: &Pacer) -> Result<FetchedPage, FetchError> {
            pacer.ready().await;
            self.log.lock().unwrap().push(url.to_string());
            let Some((delay, body)) = self.pages.get(url.as_str()).cloned() else {
                return Err(FetchError::Http { status: 404 });
            };
            tokio::time::sleep(delay).await;
            Ok(FetchedPage {
                final_url: url.clone(),
                status_code: 200,
                body,
            })
        }
    }

    fn resolver() -> Arc<StaticMxResolver> {
        Arc::new(StaticMxResolver::new().with_mx("a.test", "mx.a.test"))
    }

    fn options(max_depth: u32) -> CrawlOptions {
        CrawlOptions {
            max_depth,
            concurrency: 4,
            ..CrawlOptions::default()
        }
    }

    fn seed(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    async fn run(
        fetcher: Arc<ScriptedFetcher>,
        options: CrawlOptions,
        seeds: &[&str],
    ) -> Vec<SeedReport> {
        let seeds = seeds.iter().map(|s| seed(s)).collect();
        Coordinator::new(fetcher, resolver(), options)
            .run(seeds, CancellationToken::new())
            .await
    }

    async fn crawl(
        fetcher: Arc<ScriptedFetcher>,
        options: CrawlOptions,
        seeds: &[&str],
    ) -> Vec<CrawlReport> {
        run(fetcher, options, seeds)
            .await
            .into_iter()
            .map(|seed| seed.report)
            .collect()
    }

    #[tokio::test]
    async fn test_seed_and_linked_page() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page("http://a.test/", r#"contact: x@a.test <a href="/page2">more</a>"#)
                .page("http://a.test/page2", "y@a.test"),
        );

        let reports = crawl(Arc::clone(&fetcher), options(1), &["http://a.test/"]).await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].emails, vec!["x@a.test", "y@a.test"]);
        assert_eq!(reports[0].status_of("http://a.test/page2"), Some(UrlStatus::Ok));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_links_fetched_once() {
        let delay = Duration::from_millis(50);
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page(
                    "http://a.test/",
                    r#"<a href="/p1">1</a><a href="/p2">2</a><a href="/p3">3</a>"#,
                )
                .slow_page("http://a.test/p1", delay, r#"<a href="/shared">s</a>"#)
                .slow_page("http://a.test/p2", delay, r#"<a href="/shared">s</a>"#)
                .slow_page("http://a.test/p3", delay, r#"<a href="/shared">s</a><a href="/">home</a>"#)
                .slow_page("http://a.test/shared", delay, "shared@a.test"),
        );

        let reports = crawl(Arc::clone(&fetcher), options(2), &["http://a.test/"]).await;

        let log = fetcher.fetched();
        let mut unique = log.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(log.len(), unique.len(), "duplicate fetch in {:?}", log);
        assert_eq!(log.iter().filter(|u| u.ends_with("/shared")).count(), 1);
        assert_eq!(reports[0].emails, vec!["shared@a.test"]);
    }

    #[tokio::test]
    async fn test_depth_zero_fetches_only_seeds() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page("http://a.test/", r#"x@a.test <a href="/page2">more</a>"#)
                .page("http://a.test/page2", "y@a.test"),
        );

        let reports = crawl(Arc::clone(&fetcher), options(0), &["http://a.test/"]).await;

        assert_eq!(fetcher.fetched(), vec!["http://a.test/"]);
        assert_eq!(reports[0].emails, vec!["x@a.test"]);
    }

    #[tokio::test]
    async fn test_no_fetch_beyond_max_depth() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page("http://a.test/", r#"<a href="/d1">1</a>"#)
                .page("http://a.test/d1", r#"<a href="/d2">2</a>"#)
                .page("http://a.test/d2", r#"<a href="/d3">3</a>"#)
                .page("http://a.test/d3", "deep@a.test"),
        );

        let reports = crawl(Arc::clone(&fetcher), options(2), &["http://a.test/"]).await;

        let log = fetcher.fetched();
        assert_eq!(log.len(), 3);
        assert!(!log.contains(&"http://a.test/d3".to_string()));
        assert!(reports[0].emails.is_empty());
    }

    #[tokio::test]
    async fn test_failed_page_does_not_abort_siblings() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page(
                    "http://a.test/",
                    r#"<a href="/missing">gone</a><a href="/ok">ok</a>"#,
                )
                .page("http://a.test/ok", "ok@a.test"),
        );

        let reports = crawl(Arc::clone(&fetcher), options(1), &["http://a.test/"]).await;

        assert_eq!(reports[0].emails, vec!["ok@a.test"]);
        assert_eq!(
            reports[0].status_of("http://a.test/missing"),
            Some(UrlStatus::Failed(FetchErrorKind::FetchHttpError(404)))
        );
    }

    #[tokio::test]
    async fn test_links_per_page_cap() {
        let links: String = (1..=8)
            .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
            .collect();
        let mut fetcher = ScriptedFetcher::default().page("http://a.test/", &links);
        for i in 1..=8 {
            fetcher = fetcher.page(&format!("http://a.test/p{}", i), "");
        }
        let fetcher = Arc::new(fetcher);

        crawl(Arc::clone(&fetcher), options(1), &["http://a.test/"]).await;

        assert_eq!(fetcher.fetched().len(), 1 + crate::crawler::DEFAULT_LINKS_PER_PAGE);
    }

    #[tokio::test]
    async fn test_emails_are_validated_and_normalized() {
        let fetcher = Arc::new(ScriptedFetcher::default().page(
            "http://a.test/",
            "Mixed@A.Test x@a.test nobody@nowhere.test icon@2.0.1",
        ));

        let reports = crawl(fetcher, options(0), &["http://a.test/"]).await;

        assert_eq!(reports[0].emails, vec!["mixed@a.test", "x@a.test"]);
    }

    #[tokio::test]
    async fn test_reports_are_per_seed() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page("http://a.test/", "x@a.test")
                .page("http://b.test/", "y@a.test"),
        );

        let reports = run(fetcher, options(1), &["http://a.test/", "http://b.test/"]).await;

        assert_eq!(reports[0].seed.as_str(), "http://a.test/");
        assert_eq!(reports[0].report.emails, vec!["x@a.test"]);
        assert_eq!(reports[1].report.emails, vec!["y@a.test"]);
        assert!(reports.iter().all(|r| r.complete));
    }

    #[tokio::test]
    async fn test_seed_reaching_another_seeds_page_is_incomplete() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page("http://a.test/", r#"home@a.test <a href="/contact">contact</a>"#)
                .page("http://a.test/contact", "contact@a.test"),
        );

        let reports = run(
            Arc::clone(&fetcher),
            options(1),
            &["http://a.test/", "http://a.test/contact"],
        )
        .await;

        // Both seeds are admitted before any link is followed
        assert_eq!(fetcher.fetched().len(), 2);
        assert_eq!(reports[0].report.emails, vec!["home@a.test"]);
        assert!(!reports[0].complete);
        assert_eq!(reports[1].report.emails, vec!["contact@a.test"]);
        assert!(reports[1].complete);
    }

    #[tokio::test]
    async fn test_revisit_within_one_seed_stays_complete() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page("http://a.test/", r#"<a href="/p">p</a>"#)
                .page("http://a.test/p", r#"p@a.test <a href="/">home</a>"#),
        );

        let reports = run(fetcher, options(2), &["http://a.test/"]).await;

        assert_eq!(reports[0].report.emails, vec!["p@a.test"]);
        assert!(reports[0].complete);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_partial_results() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page("http://a.test/", r#"x@a.test <a href="/slow">slow</a>"#)
                .slow_page("http://a.test/slow", Duration::from_secs(30), "y@a.test"),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let reports = Coordinator::new(fetcher, resolver(), options(1))
            .run(vec![seed("http://a.test/")], cancel)
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!reports[0].complete);
        assert_eq!(reports[0].report.emails, vec!["x@a.test"]);
        assert_eq!(
            reports[0].report.status_of("http://a.test/slow"),
            Some(UrlStatus::Failed(FetchErrorKind::Cancelled))
        );
    }

    #[tokio::test]
    async fn test_deadline_keeps_partial_results() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .page("http://a.test/", r#"x@a.test <a href="/slow">slow</a>"#)
                .slow_page("http://a.test/slow", Duration::from_secs(30), "y@a.test"),
        );

        let options = CrawlOptions {
            deadline: Some(Duration::from_millis(300)),
            ..options(1)
        };
        let reports = crawl(fetcher, options, &["http://a.test/"]).await;

        assert_eq!(reports[0].emails, vec!["x@a.test"]);
        assert_eq!(reports[0].status_of("http://a.test/"), Some(UrlStatus::Ok));
        assert_eq!(
            reports[0].status_of("http://a.test/slow"),
            Some(UrlStatus::Failed(FetchErrorKind::Cancelled))
        );
    }

    #[tokio::test]
    async fn test_empty_seed_list() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let reports = crawl(Arc::clone(&fetcher), options(2), &[]).await;
        assert!(reports.is_empty());
        assert!(fetcher.fetched().is_empty());
    }
}
