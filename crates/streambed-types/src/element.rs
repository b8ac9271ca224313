//! Timestamped, windowed values flowing through the core.

use crate::time::Timestamp;
use crate::window::Window;

/// One firing of a window: an index plus the finality bits the host needs to decide whether more
/// panes for this window are still possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaneInfo {
    /// Strictly increasing per window, starting at 0 for the first firing.
    pub index: u32,
    /// False for firings caused purely by element arrival ahead of the on-time firing; Beam-style
    /// terminology calls a non-speculative firing "on time or late".
    pub is_speculative: bool,
    /// True when the trigger has moved to its closed state and no further panes will follow.
    pub is_last: bool,
}

impl PaneInfo {
    /// The first firing for a window. `is_final` mirrors whatever the caller already knows about
    /// this firing — a window closing on its very first pane (the common case for a bare
    /// `AfterWatermark` trigger with the watermark held at -∞ until end of input) is final on
    /// arrival, not "first, then later closed".
    pub fn first(is_final: bool) -> Self {
        Self {
            index: 0,
            is_speculative: !is_final,
            is_last: is_final,
        }
    }

    pub fn next(&self, is_last: bool) -> Self {
        Self {
            index: self.index + 1,
            is_speculative: !is_last,
            is_last,
        }
    }
}

/// A value together with its event timestamp and the (non-empty) set of windows it has been
/// assigned to.
#[derive(Debug, Clone)]
pub struct Element<V> {
    pub value: V,
    pub timestamp: Timestamp,
    pub windows: Vec<Window>,
    pub pane: PaneInfo,
}

impl<V> Element<V> {
    /// Constructs an element assigned to a single window, the common case for input arriving from
    /// a host before window assignment.
    pub fn new(value: V, timestamp: Timestamp, window: Window) -> Self {
        Self {
            value,
            timestamp,
            windows: vec![window],
            pane: PaneInfo::default(),
        }
    }

    pub fn with_windows(value: V, timestamp: Timestamp, windows: Vec<Window>) -> Self {
        assert!(!windows.is_empty(), "an element must have at least one window");
        Self {
            value,
            timestamp,
            windows,
            pane: PaneInfo::default(),
        }
    }

    /// A copy of this element scoped to exactly one of its assigned windows, used once per-window
    /// fan-out has happened inside the runners.
    pub fn in_window(&self, window: Window) -> Element<V>
    where
        V: Clone,
    {
        Element {
            value: self.value.clone(),
            timestamp: self.timestamp,
            windows: vec![window],
            pane: self.pane,
        }
    }
}

/// A windowed value paired with the pane it was emitted in, handed to the output receiver.
#[derive(Debug, Clone)]
pub struct WindowedValue<V> {
    pub value: V,
    pub timestamp: Timestamp,
    pub window: Window,
    pub pane: PaneInfo,
}
