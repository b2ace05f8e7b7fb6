//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageState`: Lifecycle of a single page (queued, fetching, extracted, failed, cancelled)
//! - `VisitedSet`: Per-invocation set of admitted URLs with atomic check-and-insert

mod page_state;
mod visited;

// Re-export main types
pub use page_state::PageState;
pub use visited::VisitedSet;
