//! Window assignment functions: fixed, sliding, session, and the global window.

use streambed_types::{Timestamp, Window};

/// A proposed merge of several active windows into one, produced by a mergeable [`WindowFn`].
#[derive(Debug, Clone)]
pub struct MergeAction {
    pub from: Vec<Window>,
    pub into: Window,
}

/// Assigns an element's event timestamp to one or more windows, and, for mergeable strategies,
/// proposes merges among the windows currently active for a key.
pub trait WindowFn: Send + Sync {
    fn assign(&self, timestamp: Timestamp) -> Vec<Window>;

    fn is_mergeable(&self) -> bool {
        false
    }

    /// Given every window currently active for a key, propose merges. The default implementation
    /// never merges anything; only [`SessionWindows`] overrides it.
    fn merge_windows(&self, _active: &[Window]) -> Vec<MergeAction> {
        Vec::new()
    }
}

/// Non-overlapping windows of fixed size, aligned to multiples of `size_ms` since the epoch.
#[derive(Debug, Clone, Copy)]
pub struct FixedWindows {
    size_ms: i64,
}

impl FixedWindows {
    pub fn new(size_ms: i64) -> Self {
        assert!(size_ms > 0, "fixed window size must be positive");
        Self { size_ms }
    }
}

impl WindowFn for FixedWindows {
    fn assign(&self, timestamp: Timestamp) -> Vec<Window> {
        let start = timestamp.div_euclid(self.size_ms) * self.size_ms;
        vec![Window::new(start, start + self.size_ms)]
    }
}

/// Overlapping windows of `size_ms`, starting every `period_ms`. An element falls into every
/// window whose interval contains its timestamp.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindows {
    size_ms: i64,
    period_ms: i64,
}

impl SlidingWindows {
    pub fn new(size_ms: i64, period_ms: i64) -> Self {
        assert!(size_ms > 0 && period_ms > 0, "sliding window size and period must be positive");
        assert!(size_ms % period_ms == 0, "sliding window size must be a multiple of its period");
        Self { size_ms, period_ms }
    }
}

impl WindowFn for SlidingWindows {
    fn assign(&self, timestamp: Timestamp) -> Vec<Window> {
        let last_start = timestamp.div_euclid(self.period_ms) * self.period_ms;
        let windows_per_element = self.size_ms / self.period_ms;
        (0..windows_per_element)
            .map(|k| {
                let start = last_start - k * self.period_ms;
                Window::new(start, start + self.size_ms)
            })
            .collect()
    }
}

/// Session windows: each element is initially assigned its own `[ts, ts + 1)` window; windows
/// whose gap is smaller than `gap_ms` are merged by [`merge_windows`](WindowFn::merge_windows).
#[derive(Debug, Clone, Copy)]
pub struct SessionWindows {
    gap_ms: i64,
}

impl SessionWindows {
    pub fn new(gap_ms: i64) -> Self {
        assert!(gap_ms > 0, "session gap must be positive");
        Self { gap_ms }
    }
}

impl WindowFn for SessionWindows {
    fn assign(&self, timestamp: Timestamp) -> Vec<Window> {
        vec![Window::new(timestamp, timestamp + 1)]
    }

    fn is_mergeable(&self) -> bool {
        true
    }

    fn merge_windows(&self, active: &[Window]) -> Vec<MergeAction> {
        let mut sorted = active.to_vec();
        sorted.sort_by_key(|w| w.start());

        let mut actions = Vec::new();
        let mut group: Vec<Window> = Vec::new();
        let mut span: Option<Window> = None;

        for w in sorted {
            match span {
                None => {
                    span = Some(w);
                    group = vec![w];
                }
                Some(current_span) if w.start() < current_span.end() + self.gap_ms => {
                    span = Some(current_span.span(&w));
                    group.push(w);
                }
                Some(current_span) => {
                    if group.len() > 1 {
                        actions.push(MergeAction { from: group.clone(), into: current_span });
                    }
                    span = Some(w);
                    group = vec![w];
                }
            }
        }
        if let Some(current_span) = span {
            if group.len() > 1 {
                actions.push(MergeAction { from: group, into: current_span });
            }
        }
        actions
    }
}

/// The single window spanning all of event time, used by non-windowed (global) strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalWindows;

impl WindowFn for GlobalWindows {
    fn assign(&self, _timestamp: Timestamp) -> Vec<Window> {
        vec![Window::global()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn fixed_windows_align_to_size() {
        let wf = FixedWindows::new(10);
        assert_eq!(wf.assign(0), vec![Window::new(0, 10)]);
        assert_eq!(wf.assign(9), vec![Window::new(0, 10)]);
        assert_eq!(wf.assign(10), vec![Window::new(10, 20)]);
    }

    #[test_case(5, vec![Window::new(0, 10), Window::new(-5, 5)] ; "middle of overlap")]
    #[test_case(0, vec![Window::new(0, 10), Window::new(-5, 5)] ; "boundary shared by two windows")]
    fn sliding_windows_assign_every_overlapping_window(ts: i64, expected: Vec<Window>) {
        let wf = SlidingWindows::new(10, 5);
        let mut got = wf.assign(ts);
        let mut expected = expected;
        got.sort();
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn session_windows_merge_when_gap_is_small_enough() {
        let wf = SessionWindows::new(5);
        let active = vec![Window::new(0, 1), Window::new(3, 4), Window::new(20, 21)];
        let actions = wf.merge_windows(&active);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].into, Window::new(0, 4));
        assert_eq!(actions[0].from.len(), 2);
    }

    #[test]
    fn session_windows_do_not_merge_across_a_large_gap() {
        let wf = SessionWindows::new(5);
        let active = vec![Window::new(0, 1), Window::new(10, 11)];
        assert!(wf.merge_windows(&active).is_empty());
    }

    #[test]
    fn global_window_assigns_every_timestamp_to_one_window() {
        let wf = GlobalWindows;
        assert_eq!(wf.assign(12345), vec![Window::global()]);
    }
}
