//! The full windowing strategy: a [`WindowFn`] and a [`Trigger`] tree bundled with the pane and
//! lateness policy that governs how a window's contents are emitted and garbage collected.

use crate::window_fn::{FixedWindows, GlobalWindows, SessionWindows, SlidingWindows, WindowFn};
use streambed_trigger::Trigger;
use streambed_types::{AccumulationMode, ClosingBehavior, OnTimeBehavior, TimestampCombiner};

/// Everything needed to turn a stream of timestamped elements into windows, panes, and persisted
/// state: how elements are assigned to windows, when a window's pane fires, how long late data is
/// still admitted, and how repeated firings relate to each other.
pub struct WindowingStrategy {
    pub window_fn: Box<dyn WindowFn>,
    pub trigger: Trigger,
    pub allowed_lateness_ms: i64,
    pub accumulation_mode: AccumulationMode,
    pub closing_behavior: ClosingBehavior,
    pub on_time_behavior: OnTimeBehavior,
    pub timestamp_combiner: TimestampCombiner,
}

impl WindowingStrategy {
    pub fn new(window_fn: Box<dyn WindowFn>, trigger: Trigger, allowed_lateness_ms: i64) -> Self {
        Self {
            window_fn,
            trigger,
            allowed_lateness_ms,
            accumulation_mode: AccumulationMode::Discarding,
            closing_behavior: ClosingBehavior::FireIfNonEmpty,
            on_time_behavior: OnTimeBehavior::FireIfNonEmpty,
            timestamp_combiner: TimestampCombiner::EndOfWindow,
        }
    }

    pub fn fixed(size_ms: i64, trigger: Trigger, allowed_lateness_ms: i64) -> Self {
        Self::new(Box::new(FixedWindows::new(size_ms)), trigger, allowed_lateness_ms)
    }

    pub fn sliding(size_ms: i64, period_ms: i64, trigger: Trigger, allowed_lateness_ms: i64) -> Self {
        Self::new(Box::new(SlidingWindows::new(size_ms, period_ms)), trigger, allowed_lateness_ms)
    }

    pub fn session(gap_ms: i64, trigger: Trigger, allowed_lateness_ms: i64) -> Self {
        Self::new(Box::new(SessionWindows::new(gap_ms)), trigger, allowed_lateness_ms)
    }

    pub fn global(trigger: Trigger, allowed_lateness_ms: i64) -> Self {
        Self::new(Box::new(GlobalWindows), trigger, allowed_lateness_ms)
    }

    pub fn with_accumulation_mode(mut self, mode: AccumulationMode) -> Self {
        self.accumulation_mode = mode;
        self
    }

    pub fn with_closing_behavior(mut self, behavior: ClosingBehavior) -> Self {
        self.closing_behavior = behavior;
        self
    }

    pub fn with_on_time_behavior(mut self, behavior: OnTimeBehavior) -> Self {
        self.on_time_behavior = behavior;
        self
    }

    pub fn with_timestamp_combiner(mut self, combiner: TimestampCombiner) -> Self {
        self.timestamp_combiner = combiner;
        self
    }
}
