//! Scheduler for concurrency limiting and request pacing
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore shared by fetches and MX lookups
//! - Optional requests-per-second pacing across the whole invocation
//!
//! Pacing is advisory: the fetcher waits on the [`Pacer`] before every HTTP
//! attempt, retries included, and requests already in flight are never
//! interrupted.

use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Shared requests-per-second budget
///
/// Cloning shares the budget. An unpaced pacer never waits.
#[derive(Clone, Default)]
pub struct Pacer {
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl Pacer {
    /// Non-positive or non-finite rates disable pacing
    pub fn new(requests_per_second: Option<f64>) -> Self {
        Self {
            limiter: requests_per_second
                .and_then(quota_for_rate)
                .map(|quota| Arc::new(RateLimiter::direct(quota))),
        }
    }

    pub fn unpaced() -> Self {
        Self::default()
    }

    /// Waits until one more request fits the budget
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    pub fn is_paced(&self) -> bool {
        self.limiter.is_some()
    }
}

/// Admission control for one crawl invocation
pub struct Scheduler {
    /// Global semaphore for limiting concurrent network operations
    permits: Arc<Semaphore>,

    pacer: Pacer,

    concurrency: usize,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum number of operations in flight
    /// * `requests_per_second` - Dispatch rate; fractional rates are allowed
    pub fn new(concurrency: usize, requests_per_second: Option<f64>) -> Self {
        let concurrency = concurrency.max(1);

        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            pacer: Pacer::new(requests_per_second),
            concurrency,
        }
    }

    /// Waits for a fetch slot
    ///
    /// Returns None only if the semaphore was closed. Pacing is left to the
    /// fetcher, which consults [`pacer`](Self::pacer) once per attempt.
    pub async fn acquire_fetch_slot(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// The semaphore shared with MX lookups
    pub fn permits(&self) -> &Semaphore {
        &self.permits
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_paced(&self) -> bool {
        self.pacer.is_paced()
    }
}

/// Converts a requests-per-second budget into a burst-free quota
fn quota_for_rate(rps: f64) -> Option<Quota> {
    if !rps.is_finite() || rps <= 0.0 {
        return None;
    }
    Quota::with_period(Duration::from_secs_f64(1.0 / rps))
}
