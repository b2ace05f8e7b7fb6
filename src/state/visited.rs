use crate::state::PageState;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Normalized URLs admitted to one crawl invocation, with their page state
///
/// Membership is monotonic: once a URL is admitted it stays, whatever state it
/// ends in. Admission is a single check-and-insert under the lock, so two tasks
/// that discover the same link concurrently cannot both fetch it.
#[derive(Debug, Default)]
pub struct VisitedSet {
    pages: Mutex<HashMap<String, PageState>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a URL as `Queued`
    ///
    /// Returns false if the URL was already admitted.
    pub fn insert(&self, url: &Url) -> bool {
        let mut pages = self.lock();
        if pages.contains_key(url.as_str()) {
            return false;
        }
        pages.insert(url.to_string(), PageState::Queued);
        true
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.lock().contains_key(url.as_str())
    }

    /// Moves an admitted URL to a new state
    ///
    /// Returns false (and leaves the state alone) for unknown URLs and for
    /// transitions the lifecycle does not allow.
    pub fn transition(&self, url: &Url, next: PageState) -> bool {
        let mut pages = self.lock();
        match pages.get_mut(url.as_str()) {
            Some(state) if state.can_transition_to(next) => {
                *state = next;
                true
            }
            Some(state) => {
                tracing::debug!("Ignoring transition {} -> {} for {}", state, next, url);
                false
            }
            None => false,
        }
    }

    pub fn state_of(&self, url: &Url) -> Option<PageState> {
        self.lock().get(url.as_str()).copied()
    }

    /// Marks every still-active URL as cancelled and returns them
    pub fn cancel_active(&self) -> Vec<String> {
        let mut pages = self.lock();
        let mut cancelled = Vec::new();
        for (url, state) in pages.iter_mut() {
            if state.is_active() {
                *state = PageState::Cancelled;
                cancelled.push(url.clone());
            }
        }
        cancelled.sort();
        cancelled
    }

    /// Number of URLs admitted so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PageState>> {
        self.pages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
