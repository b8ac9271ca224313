//! Window identities.
//!
//! A [`Window`] is a half-open event-time interval `[start, end)`. Its `maxTimestamp` is
//! `end - 1`, the last instant it includes. The global window is represented as the interval
//! `[MIN_TIMESTAMP, MAX_TIMESTAMP)` so that `max_timestamp()` is `+infinity` without a separate
//! enum arm threading through every match.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::{Timestamp, MAX_TIMESTAMP, MIN_TIMESTAMP};

/// A half-open event-time interval that serves as a state-namespace key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Window {
    start: Timestamp,
    end: Timestamp,
}

impl Window {
    /// Builds the window `[start, end)`. Panics if `end <= start`, since a window must cover at
    /// least one millisecond.
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        assert!(end > start, "window end must be strictly after start");
        Self { start, end }
    }

    /// The single window spanning all of event time.
    pub fn global() -> Self {
        Self {
            start: MIN_TIMESTAMP,
            end: MAX_TIMESTAMP,
        }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// The last event-time instant this window includes.
    pub fn max_timestamp(&self) -> Timestamp {
        self.end.saturating_sub(1)
    }

    /// `maxTimestamp(window) + allowedLateness`, saturating so a global window's expiration stays
    /// at `+infinity` rather than overflowing.
    pub fn expiration(&self, allowed_lateness_ms: i64) -> Timestamp {
        self.max_timestamp().saturating_add(allowed_lateness_ms)
    }

    pub fn is_global(&self) -> bool {
        self.end == MAX_TIMESTAMP
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Windows overlap when their intervals intersect; used by session-window merging.
    pub fn intersects(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The smallest window covering both inputs, used to merge two session windows.
    pub fn span(&self, other: &Window) -> Window {
        Window::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "Window[global]")
        } else {
            write!(f, "Window[{}, {})", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_timestamp_is_last_included_instant() {
        let w = Window::new(0, 10);
        assert_eq!(w.max_timestamp(), 9);
        assert!(w.contains(9));
        assert!(!w.contains(10));
    }

    #[test]
    fn global_window_has_infinite_max_timestamp() {
        let w = Window::global();
        assert_eq!(w.max_timestamp(), MAX_TIMESTAMP - 1);
        assert!(w.is_global());
    }

    #[test]
    fn expiration_adds_allowed_lateness() {
        let w = Window::new(0, 10);
        assert_eq!(w.expiration(1), 10);
    }

    #[test]
    fn session_windows_merge_into_their_span() {
        let a = Window::new(0, 10);
        let b = Window::new(5, 20);
        assert!(a.intersects(&b));
        assert_eq!(a.span(&b), Window::new(0, 20));
    }
}
