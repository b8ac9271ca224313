//! Group-also-by-window: buffers each key's elements per window, drives the trigger machine, and
//! emits grouped panes.

use crate::batch_driver::TimerDriven;
use crate::strategy::WindowingStrategy;
use crate::timer_store::TimerStore;
use std::sync::Arc;
use streambed_state::StateStore;
use streambed_trigger::{TriggerContext, TriggerMachine};
use streambed_types::{
    AccumulationMode, ClosingBehavior, CoreError, Element, MetricSink, OnTimeBehavior, PaneInfo, PipelineOptions, Result,
    StateNamespace, TimeDomain, Timer, TimerId, Timestamp, TimestampCombiner, Window, WindowedValue, PROCESSED_ELEMENTS,
};

use crate::output::OutputReceiver;

const BUF_CELL: &str = "buf";
const PANE_CELL: &str = "__pane";
const ACTIVE_WINDOWS_CELL: &str = "__active_windows";
const EOW_TIMER: &str = "__eow";

struct TimerSchedulingContext<'a> {
    timers: &'a mut TimerStore,
}

impl<'a> TriggerContext for TimerSchedulingContext<'a> {
    fn schedule_processing_timer(&mut self, window: Window, at: Timestamp) {
        let id = TimerId::internal(StateNamespace::window(window), "__trigger-pt", TimeDomain::ProcessingTime);
        self.timers.set(Timer::new(id, at));
    }
}

/// Drives one key's group-also-by-window processing: window assignment and merging, trigger
/// evaluation, and pane emission, backed by its own [`StateStore`] and [`TimerStore`].
pub struct ReduceFnRunner<K, V> {
    key: K,
    strategy: WindowingStrategy,
    trigger_machine: TriggerMachine,
    state: StateStore,
    timers: TimerStore,
    metrics: Arc<dyn MetricSink>,
    /// The options passed to the most recent `process_elements` call. The timer-dispatch path
    /// (merges, EOW finalization) runs outside any single `process_elements` call, so it reads
    /// this stored copy rather than needing options threaded through every timer callback.
    options: PipelineOptions,
    _marker: std::marker::PhantomData<V>,
}

impl<K, V> ReduceFnRunner<K, V>
where
    V: Clone + Send + 'static,
{
    pub fn new(key: K, strategy: WindowingStrategy, metrics: Arc<dyn MetricSink>) -> Self {
        let trigger_machine = TriggerMachine::new(strategy.trigger.clone());
        Self {
            key,
            strategy,
            trigger_machine,
            state: StateStore::new(),
            timers: TimerStore::new(),
            metrics,
            options: PipelineOptions::default(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Rehydrates a runner against a previously-persisted `StateStore`/`TimerStore` pair, for
    /// hosts that back a key's state across invocations. `persist()` has no separate method here:
    /// the core never owns a serialization format (§6), so a host persists by holding onto (or
    /// encoding) the stores it handed in, and resumes by constructing a runner with them instead
    /// of fresh ones.
    pub fn resume(key: K, strategy: WindowingStrategy, metrics: Arc<dyn MetricSink>, state: StateStore, timers: TimerStore) -> Self {
        let trigger_machine = TriggerMachine::new(strategy.trigger.clone());
        Self {
            key,
            strategy,
            trigger_machine,
            state,
            timers,
            metrics,
            options: PipelineOptions::default(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// Hands back ownership of this key's state and timers, e.g. for a host to persist between
    /// invocations. Idempotent: calling it twice with no intervening mutation yields identical
    /// contents both times, since it only reads.
    pub fn into_parts(self) -> (StateStore, TimerStore) {
        (self.state, self.timers)
    }

    fn eow_timer_id(window: Window) -> TimerId {
        TimerId::internal(StateNamespace::window(window), EOW_TIMER, TimeDomain::EventTime)
    }

    fn is_new_window(&mut self, window: Window) -> Result<bool> {
        Ok(self
            .state
            .set_cell::<Window>(StateNamespace::Global, ACTIVE_WINDOWS_CELL)?
            .add(window))
    }

    fn active_windows(&mut self) -> Result<Vec<Window>> {
        Ok(self
            .state
            .set_cell::<Window>(StateNamespace::Global, ACTIVE_WINDOWS_CELL)?
            .iter()
            .copied()
            .collect())
    }

    fn schedule_eow_timer(&mut self, window: Window) {
        let allowed_lateness = self.options.effective_allowed_lateness(self.strategy.allowed_lateness_ms);
        let expiration = window.expiration(allowed_lateness);
        self.timers.set(Timer::new(Self::eow_timer_id(window), expiration));
    }

    /// Buffers every input element into its assigned window(s), then runs one round of window
    /// merging if the strategy is mergeable, pushing any pane that becomes ready along the way.
    pub fn process_elements(
        &mut self,
        elements: Vec<Element<V>>,
        out: &mut dyn OutputReceiver<Vec<V>>,
        options: &PipelineOptions,
    ) -> Result<()> {
        self.options = options.clone();
        for element in elements {
            let windows = self.strategy.window_fn.assign(element.timestamp);
            for window in windows {
                self.buffer_and_trigger(window, element.in_window(window), out)?;
            }
            options.record_metric(self.metrics.as_ref(), PROCESSED_ELEMENTS, 1);
        }

        if self.strategy.window_fn.is_mergeable() {
            self.run_merges(out)?;
        }
        Ok(())
    }

    fn buffer_and_trigger(&mut self, window: Window, element: Element<V>, out: &mut dyn OutputReceiver<Vec<V>>) -> Result<()> {
        if self.is_new_window(window)? {
            self.schedule_eow_timer(window);
        }
        self.state
            .bag_cell::<Element<V>>(StateNamespace::window(window), BUF_CELL)?
            .add(element);

        let pt = self.timers.processing_time();
        let mut ctx = TimerSchedulingContext { timers: &mut self.timers };
        self.trigger_machine.on_element(&mut self.state, window, pt, &mut ctx)?;

        self.maybe_emit(window, false, out)
    }

    fn run_merges(&mut self, out: &mut dyn OutputReceiver<Vec<V>>) -> Result<()> {
        let active = self.active_windows()?;
        let actions = self.strategy.window_fn.merge_windows(&active);
        for action in actions {
            let dest_ns = StateNamespace::window(action.into);
            let mut moved = Vec::new();
            for src in &action.from {
                if *src == action.into {
                    continue;
                }
                let src_ns = StateNamespace::window(*src);
                let elems = self.state.bag_cell::<Element<V>>(src_ns, BUF_CELL)?.take();
                moved.extend(elems);
                self.state.clear_namespace(src_ns);
                self.timers.delete(&Self::eow_timer_id(*src));
                self.state
                    .set_cell::<Window>(StateNamespace::Global, ACTIVE_WINDOWS_CELL)?
                    .remove(src);
            }
            for elem in moved {
                self.state.bag_cell::<Element<V>>(dest_ns, BUF_CELL)?.add(elem);
            }
            self.is_new_window(action.into)?;
            self.schedule_eow_timer(action.into);

            let mut ctx = TimerSchedulingContext { timers: &mut self.timers };
            self.trigger_machine.on_merge(&mut self.state, &action.from, action.into, &mut ctx)?;

            self.maybe_emit(action.into, false, out)?;
        }
        Ok(())
    }

    fn maybe_emit(&mut self, window: Window, is_final: bool, out: &mut dyn OutputReceiver<Vec<V>>) -> Result<()> {
        let wm = self.timers.input_watermark();
        let pt = self.timers.processing_time();
        let ready = is_final || self.trigger_machine.should_fire(&mut self.state, window, wm, pt)?;
        if !ready {
            return Ok(());
        }

        let ns = StateNamespace::window(window);
        let discarding = self.strategy.accumulation_mode == AccumulationMode::Discarding;
        let elements: Vec<Element<V>> = if discarding {
            self.state.bag_cell::<Element<V>>(ns, BUF_CELL)?.take()
        } else {
            self.state.bag_cell::<Element<V>>(ns, BUF_CELL)?.read().to_vec()
        };

        // A closing (`is_final`) pane is governed by `closing_behavior`; an earlier, still-open
        // pane is governed by `on_time_behavior`. Both default to `FireIfNonEmpty`.
        let fire_when_empty = if is_final {
            self.strategy.closing_behavior == ClosingBehavior::FireAlways
        } else {
            self.strategy.on_time_behavior == OnTimeBehavior::FireAlways
        };
        if elements.is_empty() && !fire_when_empty {
            return Ok(());
        }

        let prev = self.state.value_cell::<PaneInfo>(ns, PANE_CELL)?.read().copied();
        let pane = match prev {
            None => PaneInfo::first(is_final),
            Some(p) => p.next(is_final),
        };
        self.state.value_cell::<PaneInfo>(ns, PANE_CELL)?.write(pane);

        self.trigger_machine.on_fire(&mut self.state, window, wm, pt)?;

        let timestamp = match self.strategy.timestamp_combiner {
            TimestampCombiner::EndOfWindow => window.max_timestamp(),
            TimestampCombiner::EarliestElement => elements.iter().map(|e| e.timestamp).min().unwrap_or_else(|| window.max_timestamp()),
            TimestampCombiner::LatestElement => elements.iter().map(|e| e.timestamp).max().unwrap_or_else(|| window.max_timestamp()),
        };

        tracing::debug!(?window, pane.index, pane.is_last, len = elements.len(), "emitting pane");
        out.push(
            None,
            WindowedValue {
                value: elements.into_iter().map(|e| e.value).collect(),
                timestamp,
                window,
                pane,
            },
        );
        Ok(())
    }

    fn finalize_window(&mut self, window: Window, out: &mut dyn OutputReceiver<Vec<V>>) -> Result<()> {
        self.maybe_emit(window, true, out)?;
        self.state.clear_namespace(StateNamespace::window(window));
        self.state
            .set_cell::<Window>(StateNamespace::Global, ACTIVE_WINDOWS_CELL)?
            .remove(&window);
        Ok(())
    }

    pub fn input_watermark(&self) -> Timestamp {
        self.timers.input_watermark()
    }

    pub fn advance_input_watermark(&mut self, t: Timestamp) -> Result<()> {
        self.timers.advance_input_watermark(t)
    }

    pub fn advance_processing_time(&mut self, t: Timestamp) -> Result<()> {
        self.timers.advance_processing_time(t)
    }

    pub fn advance_sync_processing_time(&mut self, t: Timestamp) -> Result<()> {
        self.timers.advance_sync_processing_time(t)
    }
}

impl<K, V> TimerDriven for ReduceFnRunnerDrain<'_, K, V>
where
    V: Clone + Send + 'static,
{
    fn timer_store_mut(&mut self) -> &mut TimerStore {
        &mut self.runner.timers
    }

    fn dispatch_timer(&mut self, timer: Timer) -> Result<()> {
        let window = timer
            .id
            .namespace
            .as_window()
            .ok_or_else(|| CoreError::TriggerContract("group-also-by-window timer fired outside a window namespace".into()))?;
        if timer.id.timer_name == EOW_TIMER {
            self.runner.finalize_window(window, self.out)
        } else {
            self.runner.maybe_emit(window, false, self.out)
        }
    }
}

/// Binds a [`ReduceFnRunner`] to the output receiver for the duration of a timer drain, so
/// [`crate::BatchDriver`] can drive the shared `TimerDriven` loop without threading the receiver
/// through every call.
pub struct ReduceFnRunnerDrain<'a, K, V> {
    pub runner: &'a mut ReduceFnRunner<K, V>,
    pub out: &'a mut dyn OutputReceiver<Vec<V>>,
}
