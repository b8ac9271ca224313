//! Small enums that parameterize a windowing strategy.
//!
//! The strategy itself — which bundles these with a window-assignment function and a trigger
//! tree — is assembled in `streambed-core`, since it has to own trait objects for both of those;
//! this crate only carries the leaf vocabulary so both `streambed-core` and `streambed-trigger`
//! can speak it without depending on each other.

/// Whether successive panes for a window re-emit all prior contents or only the delta since the
/// last firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationMode {
    Discarding,
    Accumulating,
}

/// Whether the window's closing (GC-triggered) pane is pushed when its buffer is empty at close
/// time — e.g. because an earlier discarding firing already drained it and nothing arrived since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosingBehavior {
    FireIfNonEmpty,
    FireAlways,
}

/// Whether a firing that happens before the window closes (an "on time" pane, as opposed to the
/// final closing pane) is pushed when its buffer is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTimeBehavior {
    FireIfNonEmpty,
    FireAlways,
}

/// How the output timestamp of a pane is derived from the timestamps of its constituent elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampCombiner {
    /// The end of the window (minus one millisecond), regardless of element timestamps.
    EndOfWindow,
    /// The earliest element timestamp seen in the pane.
    EarliestElement,
    /// The latest element timestamp seen in the pane.
    LatestElement,
}
