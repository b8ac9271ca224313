//! Drives a user-defined [`DoFn`] per (key, window): admission (with late-data dropping), GC
//! scheduling, optional event-time sorted delivery, and timer/window-expiration dispatch.

use crate::batch_driver::TimerDriven;
use crate::dofn::{DoFn, ElementContext, DoFnSignature};
use crate::output::OutputReceiver;
use crate::timer_store::TimerStore;
use ahash::AHashSet;
use std::sync::Arc;
use streambed_state::StateStore;
use streambed_types::{
    CoreError, Element, MetricSink, PipelineOptions, Result, StateNamespace, TimeDomain, Timer, TimerId, Timestamp,
    Window, DROPPED_DUE_TO_LATENESS, PROCESSED_ELEMENTS,
};

const GC_TIMER: &str = "__gc";
const SORT_FLUSH_TIMER: &str = "__sort_flush";
const SORT_BUF_CELL: &str = "__sort_buf";

struct RunnerContext<'a, K> {
    key: &'a K,
    window: Window,
    state: &'a mut StateStore,
    timers: &'a mut TimerStore,
}

impl<'a, K> ElementContext<K> for RunnerContext<'a, K> {
    fn key(&self) -> &K {
        self.key
    }

    fn window(&self) -> Window {
        self.window
    }

    fn state(&mut self) -> &mut StateStore {
        self.state
    }

    fn input_watermark(&self) -> Timestamp {
        self.timers.input_watermark()
    }

    fn processing_time(&self) -> Timestamp {
        self.timers.processing_time()
    }

    fn set_timer(&mut self, name: &str, family: &str, domain: TimeDomain, timestamp: Timestamp, output_timestamp: Timestamp) {
        let id = TimerId::new(StateNamespace::window(self.window), name, family, domain);
        self.timers.set(Timer::new(id, timestamp).with_output_timestamp(output_timestamp));
    }

    fn delete_timer(&mut self, name: &str, family: &str, domain: TimeDomain) {
        let id = TimerId::new(StateNamespace::window(self.window), name, family, domain);
        self.timers.delete(&id);
    }
}

/// Drives one key's stateful element processing: admits or drops each element, schedules GC and
/// (optionally) sort-flush timers, and dispatches fired timers to the right handler.
pub struct StatefulRunner<K, V, O> {
    key: K,
    dofn: Box<dyn DoFn<K, V, O>>,
    signature: DoFnSignature,
    allowed_lateness_ms: i64,
    state: StateStore,
    timers: TimerStore,
    metrics: Arc<dyn MetricSink>,
    touched_windows: AHashSet<Window>,
    /// The options passed to the most recent `process_element` call, kept around so the
    /// timer-dispatch path (which runs independently of any single `process_element` call) can
    /// still honor `disable_metrics`.
    options: PipelineOptions,
}

impl<K, V, O> StatefulRunner<K, V, O>
where
    K: Clone,
    V: Clone + Send + 'static,
{
    pub fn new(key: K, dofn: Box<dyn DoFn<K, V, O>>, allowed_lateness_ms: i64, metrics: Arc<dyn MetricSink>) -> Self {
        let signature = dofn.signature();
        Self {
            key,
            dofn,
            signature,
            allowed_lateness_ms,
            state: StateStore::new(),
            timers: TimerStore::new(),
            metrics,
            touched_windows: AHashSet::default(),
            options: PipelineOptions::default(),
        }
    }

    /// Rehydrates a runner against previously-persisted state, mirroring
    /// [`crate::reduce_fn_runner::ReduceFnRunner::resume`]. `touched_windows` is not itself
    /// persisted state (§9: it's runner-internal bookkeeping, not a user-visible cell), so a
    /// resumed runner starts with an empty set; a host that needs `onWindowExpiration` to fire
    /// across a resume must re-derive it from the windows still present in `state`.
    pub fn resume(
        key: K,
        dofn: Box<dyn DoFn<K, V, O>>,
        allowed_lateness_ms: i64,
        metrics: Arc<dyn MetricSink>,
        state: StateStore,
        timers: TimerStore,
    ) -> Self {
        let signature = dofn.signature();
        Self {
            key,
            dofn,
            signature,
            allowed_lateness_ms,
            state,
            timers,
            metrics,
            touched_windows: AHashSet::default(),
            options: PipelineOptions::default(),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn timers_mut(&mut self) -> &mut TimerStore {
        &mut self.timers
    }

    /// Hands back ownership of this key's state and timers for persistence between invocations.
    pub fn into_parts(self) -> (StateStore, TimerStore) {
        (self.state, self.timers)
    }

    fn gc_timer_id(window: Window) -> TimerId {
        TimerId::internal(StateNamespace::window(window), GC_TIMER, TimeDomain::EventTime)
    }

    fn sort_flush_timer_id(window: Window) -> TimerId {
        TimerId::internal(StateNamespace::window(window), SORT_FLUSH_TIMER, TimeDomain::EventTime)
    }

    fn effective_allowed_lateness(&self, options: &PipelineOptions) -> i64 {
        options.effective_allowed_lateness(self.allowed_lateness_ms)
    }

    /// Admits (or drops as late) one element into each of its assigned windows.
    pub fn process_element(&mut self, element: Element<V>, out: &mut dyn OutputReceiver<O>, options: &PipelineOptions) -> Result<()> {
        self.options = options.clone();
        let allowed_lateness = self.effective_allowed_lateness(options);
        let sorted_delivery = options.ordering_enabled && self.signature.requires_time_sorted_input;

        for window in element.windows.clone() {
            let expiration = window.expiration(allowed_lateness);
            if self.timers.input_watermark() > expiration {
                tracing::warn!(?window, timestamp = element.timestamp, expiration, "dropping element as late");
                options.record_metric(self.metrics.as_ref(), DROPPED_DUE_TO_LATENESS, 1);
                continue;
            }

            self.touched_windows.insert(window);
            self.timers.set(Timer::new(Self::gc_timer_id(window), expiration.saturating_add(streambed_types::GC_DELAY_MS)));

            if sorted_delivery {
                self.state
                    .bag_cell::<Element<V>>(StateNamespace::window(window), SORT_BUF_CELL)?
                    .add(element.in_window(window));
                self.timers.set(Timer::new(Self::sort_flush_timer_id(window), expiration));
            } else {
                self.invoke_process_element(window, element.in_window(window), out)?;
            }
        }
        Ok(())
    }

    fn invoke_process_element(&mut self, window: Window, element: Element<V>, out: &mut dyn OutputReceiver<O>) -> Result<()> {
        let mut ctx = RunnerContext {
            key: &self.key,
            window,
            state: &mut self.state,
            timers: &mut self.timers,
        };
        self.dofn
            .process_element(&mut ctx, element.timestamp, &element.value, out)
            .map_err(CoreError::UserCodeFailure)?;
        self.options.record_metric(self.metrics.as_ref(), PROCESSED_ELEMENTS, 1);
        Ok(())
    }

    fn flush_sorted(&mut self, window: Window, out: &mut dyn OutputReceiver<O>) -> Result<()> {
        let ns = StateNamespace::window(window);
        let mut elements = self.state.bag_cell::<Element<V>>(ns, SORT_BUF_CELL)?.take();
        // Stable sort: ties keep their original arrival order.
        elements.sort_by_key(|e| e.timestamp);
        for element in elements {
            self.invoke_process_element(window, element, out)?;
        }
        Ok(())
    }

    /// Dispatches one fired timer: GC clears the window's state, sort-flush drains the buffered
    /// elements in event-time order, and anything else is a user-declared timer.
    fn dispatch(&mut self, timer: Timer, out: &mut dyn OutputReceiver<O>) -> Result<()> {
        let window = timer
            .id
            .namespace
            .as_window()
            .ok_or_else(|| CoreError::TriggerContract("stateful timer fired outside a window namespace".into()))?;

        if timer.id.family == TimerId::INTERNAL_FAMILY {
            match timer.id.timer_name.as_str() {
                GC_TIMER => {
                    tracing::debug!(?window, "garbage collecting window state");
                    self.state.clear_namespace(StateNamespace::window(window));
                    Ok(())
                }
                SORT_FLUSH_TIMER => self.flush_sorted(window, out),
                other => Err(CoreError::TriggerContract(format!("unrecognized internal timer {other:?}"))),
            }
        } else {
            let mut ctx = RunnerContext {
                key: &self.key,
                window,
                state: &mut self.state,
                timers: &mut self.timers,
            };
            self.dofn
                .on_timer(&mut ctx, &timer.id.timer_name, &timer.id.family, timer.id.domain, timer.timestamp, out)
                .map_err(CoreError::UserCodeFailure)
        }
    }

    /// Invoked by `BatchDriver` once all timers have drained: calls `onWindowExpiration` for every
    /// window this key ever admitted an element into, if the `DoFn` declared one.
    pub fn invoke_window_expirations(&mut self, out: &mut dyn OutputReceiver<O>) -> Result<()> {
        if !self.signature.has_window_expiration {
            return Ok(());
        }
        let windows: Vec<Window> = self.touched_windows.iter().copied().collect();
        for window in windows {
            let mut ctx = RunnerContext {
                key: &self.key,
                window,
                state: &mut self.state,
                timers: &mut self.timers,
            };
            self.dofn.on_window_expiration(&mut ctx, out).map_err(CoreError::UserCodeFailure)?;
        }
        Ok(())
    }
}

/// Binds a [`StatefulRunner`] to its output receiver for the duration of a timer drain.
pub struct StatefulRunnerDrain<'a, K, V, O> {
    pub runner: &'a mut StatefulRunner<K, V, O>,
    pub out: &'a mut dyn OutputReceiver<O>,
}

impl<K, V, O> TimerDriven for StatefulRunnerDrain<'_, K, V, O>
where
    K: Clone,
    V: Clone + Send + 'static,
{
    fn timer_store_mut(&mut self) -> &mut TimerStore {
        &mut self.runner.timers
    }

    fn dispatch_timer(&mut self, timer: Timer) -> Result<()> {
        self.runner.dispatch(timer, self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_driver::BatchDriver;
    use crate::output::VecOutputReceiver;
    use std::error::Error;
    use streambed_types::{CountingMetricSink, NoopMetricSink, Window};

    struct Sum;
    impl DoFn<&'static str, i64, i64> for Sum {
        fn process_element(
            &mut self,
            ctx: &mut dyn ElementContext<&'static str>,
            _timestamp: Timestamp,
            value: &i64,
            out: &mut dyn OutputReceiver<i64>,
        ) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
            let cell = ctx.state().value_cell::<i64>(StateNamespace::window(ctx.window()), "total")?;
            let total = cell.read().copied().unwrap_or(0) + value;
            cell.write(total);
            out.push(None, streambed_types::WindowedValue {
                value: total,
                timestamp: _timestamp,
                window: ctx.window(),
                pane: streambed_types::PaneInfo::default(),
            });
            Ok(())
        }
    }

    #[test]
    fn late_elements_are_dropped_and_counted() {
        let metrics = Arc::new(CountingMetricSink::new());
        let mut runner = StatefulRunner::new("k", Box::new(Sum), 1, metrics.clone());
        runner.timers_mut().advance_input_watermark(streambed_types::MAX_TIMESTAMP).unwrap();

        let mut out = VecOutputReceiver::default();
        let options = PipelineOptions::default();
        runner
            .process_element(Element::new(1, 0, Window::new(0, 10)), &mut out, &options)
            .unwrap();

        assert_eq!(metrics.get(DROPPED_DUE_TO_LATENESS), 1);
        assert!(out.outputs.is_empty());
    }

    #[test]
    fn gc_fires_after_allowed_lateness_and_clears_state() {
        let metrics = Arc::new(NoopMetricSink);
        let mut runner = StatefulRunner::new("k", Box::new(Sum), 1, metrics);
        let options = PipelineOptions::default();
        let mut out = VecOutputReceiver::default();

        let w = Window::new(0, 10);
        runner.process_element(Element::new(1, 1, w), &mut out, &options).unwrap();
        runner.timers_mut().advance_input_watermark(12).unwrap();
        BatchDriver::drain_ready_timers(&mut StatefulRunnerDrain { runner: &mut runner, out: &mut out }).unwrap();

        assert!(runner.state.namespace_is_empty(StateNamespace::window(w)));

        let w2 = Window::new(10, 20);
        runner.process_element(Element::new(1, 10, w2), &mut out, &options).unwrap();
        runner.process_element(Element::new(1, 10, w2), &mut out, &options).unwrap();
        assert_eq!(out.outputs.last().unwrap().1.value, 2);
        // w2's GC timer fires at maxTimestamp(19) + allowedLateness(1) + GC_DELAY_MS(1) = 21, so
        // its state must still be intact at the current watermark (12) and even just shy of GC.
        assert!(!runner.state.namespace_is_empty(StateNamespace::window(w2)));
        runner.timers_mut().advance_input_watermark(20).unwrap();
        BatchDriver::drain_ready_timers(&mut StatefulRunnerDrain { runner: &mut runner, out: &mut out }).unwrap();
        assert!(!runner.state.namespace_is_empty(StateNamespace::window(w2)));

        runner.timers_mut().advance_input_watermark(streambed_types::MAX_TIMESTAMP).unwrap();
        BatchDriver::drain_ready_timers(&mut StatefulRunnerDrain { runner: &mut runner, out: &mut out }).unwrap();
        assert!(runner.state.namespace_is_empty(StateNamespace::window(w2)));
    }
}
