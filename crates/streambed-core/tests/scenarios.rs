//! End-to-end scenarios: fixed windows of size 10ms, allowed lateness 1ms, windows `[0, 10)` and
//! `[10, 20)`, matching the reference scenarios used to pin this core's observable contract.

use std::error::Error;
use std::sync::Arc;
use streambed_core::{BatchDriver, DoFn, DoFnSignature, ElementContext, OutputReceiver, ReduceFnRunner, ReduceFnRunnerDrain, StatefulRunner, VecOutputReceiver, WindowingStrategy};
use streambed_trigger::Trigger;
use streambed_types::{
    CountingMetricSink, Element, NoopMetricSink, PipelineOptions, StateNamespace, Timestamp, Window, WindowedValue,
    DROPPED_DUE_TO_LATENESS,
};

/// A running-sum `DoFn`, optionally requiring event-time sorted input.
struct RunningSum {
    sorted: bool,
}

impl DoFn<&'static str, i64, i64> for RunningSum {
    fn signature(&self) -> DoFnSignature {
        DoFnSignature {
            requires_time_sorted_input: self.sorted,
            has_window_expiration: false,
        }
    }

    fn process_element(
        &mut self,
        ctx: &mut dyn ElementContext<&'static str>,
        timestamp: Timestamp,
        value: &i64,
        out: &mut dyn OutputReceiver<i64>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let ns = StateNamespace::window(ctx.window());
        let cell = ctx.state().value_cell::<i64>(ns, "total")?;
        let total = cell.read().copied().unwrap_or(0) + value;
        cell.write(total);
        out.push(
            None,
            WindowedValue {
                value: total,
                timestamp,
                window: ctx.window(),
                pane: streambed_types::PaneInfo::default(),
            },
        );
        Ok(())
    }
}

#[test]
fn s1_late_element_is_dropped_with_no_output() {
    let metrics = Arc::new(CountingMetricSink::new());
    let mut runner = StatefulRunner::new("hello", Box::new(RunningSum { sorted: false }), 1, metrics.clone());
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
fn s2_gc_preserves_a_sibling_windows_timers() {
    let metrics = Arc::new(NoopMetricSink);
    let mut runner = StatefulRunner::new("k", Box::new(RunningSum { sorted: false }), 1, metrics);
    let options = PipelineOptions::default();
    let mut out = VecOutputReceiver::default();

    let w1 = Window::new(0, 10);
    runner.process_element(Element::new(1, 1, w1), &mut out, &options).unwrap();
    runner.timers_mut().advance_input_watermark(12).unwrap();
    BatchDriver::drain_ready_timers(&mut streambed_core::StatefulRunnerDrain { runner: &mut runner, out: &mut out }).unwrap();

    let w2 = Window::new(10, 20);
    runner.process_element(Element::new(1, 10, w2), &mut out, &options).unwrap();
    runner.process_element(Element::new(1, 10, w2), &mut out, &options).unwrap();
    assert_eq!(out.outputs.last().unwrap().1.value, 2);

    runner.timers_mut().advance_input_watermark(streambed_types::MAX_TIMESTAMP).unwrap();
    BatchDriver::drain_ready_timers(&mut streambed_core::StatefulRunnerDrain { runner: &mut runner, out: &mut out }).unwrap();
}

#[test]
fn s3_ordered_delivery_sees_ascending_event_timestamps() {
    let metrics = Arc::new(NoopMetricSink);
    let mut runner = StatefulRunner::new("k", Box::new(RunningSum { sorted: true }), 1, metrics);
    let options = PipelineOptions { ordering_enabled: true, ..Default::default() };
    let mut out = VecOutputReceiver::default();

    let w = Window::new(0, 10);
    runner.process_element(Element::new(1, 5, w), &mut out, &options).unwrap();
    runner.process_element(Element::new(2, 4, w), &mut out, &options).unwrap();
    assert!(out.outputs.is_empty(), "sorted delivery buffers until the flush timer fires");

    BatchDriver::drain_to_completion(&mut streambed_core::StatefulRunnerDrain { runner: &mut runner, out: &mut out }).unwrap();

    let totals: Vec<i64> = out.outputs.iter().map(|(_, wv)| wv.value).collect();
    assert_eq!(totals, vec![2, 3]);
    let timestamps: Vec<Timestamp> = out.outputs.iter().map(|(_, wv)| wv.timestamp).collect();
    assert_eq!(timestamps, vec![4, 5]);
}

#[test]
fn s4_unordered_delivery_sees_arrival_order() {
    let metrics = Arc::new(NoopMetricSink);
    let mut runner = StatefulRunner::new("k", Box::new(RunningSum { sorted: false }), 1, metrics);
    let options = PipelineOptions::default();
    let mut out = VecOutputReceiver::default();

    let w = Window::new(0, 10);
    runner.process_element(Element::new(1, 5, w), &mut out, &options).unwrap();
    runner.process_element(Element::new(2, 4, w), &mut out, &options).unwrap();

    let totals: Vec<i64> = out.outputs.iter().map(|(_, wv)| wv.value).collect();
    assert_eq!(totals, vec![1, 3]);
}

#[test]
fn s5_duplicate_element_dropped_once_ordered_buffer_has_closed() {
    let metrics = Arc::new(CountingMetricSink::new());
    let mut runner = StatefulRunner::new("k", Box::new(RunningSum { sorted: true }), 1, metrics.clone());
    let options = PipelineOptions { ordering_enabled: true, ..Default::default() };
    let mut out = VecOutputReceiver::default();

    // A one-millisecond window: maxTimestamp = 0, so expiration = 0 + allowedLateness(1) = 1.
    let w = Window::new(0, 1);
    runner.process_element(Element::new(1, 0, w), &mut out, &options).unwrap();
    runner.timers_mut().advance_input_watermark(2).unwrap();
    runner.process_element(Element::new(1, 0, w), &mut out, &options).unwrap();

    assert_eq!(metrics.get(DROPPED_DUE_TO_LATENESS), 1);
}

#[test]
fn s6_group_also_by_window_emits_one_pane_per_window() {
    let strategy = WindowingStrategy::fixed(10, Trigger::AfterWatermark, 1);
    let mut runner = ReduceFnRunner::<&str, i64>::new("k", strategy, Arc::new(NoopMetricSink));
    let mut out = VecOutputReceiver::default();
    let options = PipelineOptions::default();

    let placeholder = Window::new(0, 10);
    let elements = vec![
        Element::new(1, 2, placeholder),
        Element::new(2, 5, placeholder),
        Element::new(3, 12, placeholder),
        Element::new(4, 15, placeholder),
    ];

    BatchDriver::run_group_also_by_window(&mut runner, elements, &mut out, &options).unwrap();

    assert_eq!(out.outputs.len(), 2);
    let mut sums: Vec<i64> = out.outputs.iter().map(|(_, wv)| wv.value.iter().sum()).collect();
    sums.sort();
    assert_eq!(sums, vec![3, 7]);
    assert!(out.outputs.iter().all(|(_, wv)| wv.pane.is_last));
}

#[test]
fn reduce_fn_runner_drain_helper_is_reachable_directly() {
    // Exercises the lower-level `ReduceFnRunnerDrain`/`drain_to_completion` path that
    // `run_group_also_by_window` wraps, for hosts that need to interleave more work between the
    // element-processing and drain phases than the convenience wrapper allows.
    let strategy = WindowingStrategy::fixed(10, Trigger::AfterWatermark, 1);
    let mut runner = ReduceFnRunner::<&str, i64>::new("k", strategy, Arc::new(NoopMetricSink));
    let mut out = VecOutputReceiver::default();
    let placeholder = Window::new(0, 10);

    runner
        .process_elements(vec![Element::new(5, 1, placeholder)], &mut out, &PipelineOptions::default())
        .unwrap();
    BatchDriver::drain_to_completion(&mut ReduceFnRunnerDrain { runner: &mut runner, out: &mut out }).unwrap();

    assert_eq!(out.outputs.len(), 1);
}

#[test]
fn p7_persisted_state_survives_a_resume_unmutated() {
    // `into_parts`/`resume` is the persistence boundary (§6): a host persists by holding onto (or
    // encoding) the returned stores and resumes by constructing a fresh runner against them. Two
    // calls to `into_parts` with no intervening mutation must hand back equivalent contents.
    let metrics = Arc::new(NoopMetricSink);
    let mut runner = StatefulRunner::new("k", Box::new(RunningSum { sorted: false }), 1, metrics.clone());
    let options = PipelineOptions::default();
    let mut out = VecOutputReceiver::default();

    let w = Window::new(0, 10);
    runner.process_element(Element::new(4, 2, w), &mut out, &options).unwrap();
    runner.process_element(Element::new(5, 3, w), &mut out, &options).unwrap();
    assert_eq!(out.outputs.last().unwrap().1.value, 9);

    let (state, timers) = runner.into_parts();
    let mut resumed = StatefulRunner::resume("k", Box::new(RunningSum { sorted: false }), 1, metrics, state, timers);

    // The running total survives the round trip: the next element's sum picks up where the
    // pre-resume runner left off, rather than starting over from a fresh `StateStore`.
    let mut out2 = VecOutputReceiver::default();
    resumed.process_element(Element::new(6, 4, w), &mut out2, &options).unwrap();
    assert_eq!(out2.outputs.last().unwrap().1.value, 15);

    // The GC timer scheduled by the pre-resume elements is still pending after the resume, not
    // lost or duplicated: advancing straight to +∞ and draining clears the window exactly once.
    resumed.timers_mut().advance_input_watermark(streambed_types::MAX_TIMESTAMP).unwrap();
    BatchDriver::drain_ready_timers(&mut streambed_core::StatefulRunnerDrain { runner: &mut resumed, out: &mut out2 }).unwrap();
    let (state_after, _) = resumed.into_parts();
    assert!(state_after.namespace_is_empty(StateNamespace::window(w)));
}
