//! End-to-end tests driving the real HTTP fetcher against mock servers

mod common;
mod crawl_tests;
mod fetch_tests;
mod proxy_tests;
