//! Drives a key's whole batch lifecycle: feed input, advance every time domain to +∞, and drain
//! timers to exhaustion (§4.7), shared between the group-also-by-window and stateful-ParDo paths.

use crate::output::OutputReceiver;
use crate::reduce_fn_runner::{ReduceFnRunner, ReduceFnRunnerDrain};
use crate::stateful_runner::StatefulRunner;
use crate::timer_store::TimerStore;
use streambed_types::{Element, PipelineOptions, Result, Timer, MAX_TIMESTAMP};

/// Something with a [`TimerStore`] and the ability to act on a timer once it's popped. Both
/// [`ReduceFnRunner`] and [`StatefulRunner`] implement this (via small borrowing adapters) so the
/// drain loop in [`BatchDriver::drain_ready_timers`] is written exactly once.
pub trait TimerDriven {
    fn timer_store_mut(&mut self) -> &mut TimerStore;
    fn dispatch_timer(&mut self, timer: Timer) -> Result<()>;
}

/// Stateless driver: every method takes the pieces it needs rather than owning them, since the
/// runners themselves own the state and timer stores for their key.
pub struct BatchDriver;

impl BatchDriver {
    /// The §4.7 fixed-point loop: drains event-time timers, then processing-time, then
    /// sync-processing-time, repeating because dispatching a timer may schedule more in any
    /// domain. Terminates once a full pass across all three domains fires nothing.
    pub fn drain_ready_timers(driven: &mut impl TimerDriven) -> Result<()> {
        loop {
            let mut fired = false;
            while let Some(t) = driven.timer_store_mut().remove_next_event_timer() {
                driven.dispatch_timer(t)?;
                fired = true;
            }
            while let Some(t) = driven.timer_store_mut().remove_next_processing_timer() {
                driven.dispatch_timer(t)?;
                fired = true;
            }
            while let Some(t) = driven.timer_store_mut().remove_next_sync_processing_timer() {
                driven.dispatch_timer(t)?;
                fired = true;
            }
            if !fired {
                break;
            }
        }
        Ok(())
    }

    /// Advances all three time domains to +∞, which makes every pending timer immediately
    /// eligible, then drains them to exhaustion. This is the end-of-input step common to both
    /// runner paths.
    pub fn drain_to_completion(driven: &mut impl TimerDriven) -> Result<()> {
        driven.timer_store_mut().advance_input_watermark(MAX_TIMESTAMP)?;
        driven.timer_store_mut().advance_processing_time(MAX_TIMESTAMP)?;
        driven.timer_store_mut().advance_sync_processing_time(MAX_TIMESTAMP)?;
        Self::drain_ready_timers(driven)
    }

    /// Runs the full group-also-by-window lifecycle for one key: buffer and trigger every input
    /// element, merge windows if the strategy calls for it, then drain to +∞ so every remaining
    /// on-time and late pane fires.
    pub fn run_group_also_by_window<K, V>(
        runner: &mut ReduceFnRunner<K, V>,
        elements: Vec<Element<V>>,
        out: &mut dyn OutputReceiver<Vec<V>>,
        options: &PipelineOptions,
    ) -> Result<()>
    where
        V: Clone + Send + 'static,
    {
        runner.process_elements(elements, out, options)?;
        Self::drain_to_completion(&mut ReduceFnRunnerDrain { runner, out })
    }

    /// Runs the full stateful-ParDo lifecycle for one key: admit (or drop as late) every input
    /// element, drain timers to +∞, then invoke `onWindowExpiration` once per touched window for
    /// DoFns that declare it.
    pub fn run_stateful<K, V, O>(
        runner: &mut StatefulRunner<K, V, O>,
        elements: Vec<Element<V>>,
        out: &mut dyn OutputReceiver<O>,
        options: &PipelineOptions,
    ) -> Result<()>
    where
        K: Clone,
        V: Clone + Send + 'static,
    {
        for element in elements {
            runner.process_element(element, out, options)?;
        }
        Self::drain_ready_timers(&mut crate::stateful_runner::StatefulRunnerDrain { runner: &mut *runner, out: &mut *out })?;
        runner.timers_mut().advance_input_watermark(MAX_TIMESTAMP)?;
        runner.timers_mut().advance_processing_time(MAX_TIMESTAMP)?;
        runner.timers_mut().advance_sync_processing_time(MAX_TIMESTAMP)?;
        Self::drain_ready_timers(&mut crate::stateful_runner::StatefulRunnerDrain { runner: &mut *runner, out: &mut *out })?;
        runner.invoke_window_expirations(out)
    }
}
