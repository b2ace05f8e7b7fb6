/// Page state definitions for tracking crawl progress
///
/// Every URL admitted to a crawl moves through `Queued -> Fetching` and ends in
/// one terminal state. Pages reached at the maximum depth still end in
/// `Extracted`; they simply spawn no children.
use std::fmt;

/// Represents the current state of a page within one crawl invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Admitted to the visited set, waiting for a concurrency slot
    Queued,

    /// Request in flight (including retries)
    Fetching,

    // ===== Terminal States =====
    /// Body fetched and mined for emails and links
    Extracted,

    /// Fetch gave up; the page contributes nothing
    Failed,

    /// The invocation was cancelled or timed out before the page finished
    Cancelled,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state (page may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Fetching)
    }

    /// Returns true if the transition `self -> next` is allowed
    ///
    /// Any active page may be cancelled; otherwise pages only move forward.
    pub fn can_transition_to(&self, next: PageState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Fetching)
                | (Self::Fetching, Self::Extracted)
                | (Self::Fetching, Self::Failed)
                | (Self::Queued, Self::Cancelled)
                | (Self::Fetching, Self::Cancelled)
        )
    }

    /// Converts the page state to its string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Extracted => "extracted",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a page state from its string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "fetching" => Some(Self::Fetching),
            "extracted" => Some(Self::Extracted),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
