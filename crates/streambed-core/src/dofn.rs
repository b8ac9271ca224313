//! The user-defined per-element function boundary driven by [`crate::stateful_runner::StatefulRunner`].

use crate::output::OutputReceiver;
use std::error::Error;
use streambed_state::StateStore;
use streambed_types::{TimeDomain, Timestamp, Window};

/// A user function's declared needs, built once per `DoFn` implementation and handed to the
/// runner as data rather than discovered by runtime reflection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoFnSignature {
    /// When true, `StatefulRunner` buffers and sorts each window's elements by event timestamp
    /// before delivery, at the cost of holding them until the window's allowed lateness expires.
    pub requires_time_sorted_input: bool,
    /// When true, `BatchDriver` invokes `DoFn::on_window_expiration` once per touched window.
    pub has_window_expiration: bool,
}

/// What a `DoFn` implementation sees while handling one element, timer, or window expiration: the
/// key and window it's scoped to, its state cells, and the ability to set or cancel its own
/// timers. Every method here operates against the one (key, window) pair the callback was invoked
/// for.
pub trait ElementContext<K> {
    fn key(&self) -> &K;
    fn window(&self) -> Window;
    fn state(&mut self) -> &mut StateStore;
    fn input_watermark(&self) -> Timestamp;
    fn processing_time(&self) -> Timestamp;

    /// Sets a timer under the given user-chosen name and family, in this callback's window.
    /// `output_timestamp` defaults to `timestamp` via [`streambed_types::Timer::new`] semantics if
    /// the caller doesn't need to hold the output watermark back further.
    fn set_timer(&mut self, name: &str, family: &str, domain: TimeDomain, timestamp: Timestamp, output_timestamp: Timestamp);

    fn delete_timer(&mut self, name: &str, family: &str, domain: TimeDomain);
}

/// A user-defined per-(key, window) element function. `K` is the grouping key type, `V` the input
/// value type, `O` the output value type.
pub trait DoFn<K, V, O> {
    fn signature(&self) -> DoFnSignature {
        DoFnSignature::default()
    }

    fn process_element(
        &mut self,
        ctx: &mut dyn ElementContext<K>,
        timestamp: Timestamp,
        value: &V,
        out: &mut dyn OutputReceiver<O>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Invoked when a user-set timer fires. `timer_name`/`family` identify which timer; the
    /// reserved `TimerId::INTERNAL_FAMILY` never reaches this method, since the runner intercepts
    /// GC and sort-flush timers itself.
    #[allow(unused_variables)]
    fn on_timer(
        &mut self,
        ctx: &mut dyn ElementContext<K>,
        timer_name: &str,
        family: &str,
        domain: TimeDomain,
        timestamp: Timestamp,
        out: &mut dyn OutputReceiver<O>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    /// Invoked once per touched window, at `maxTimestamp(window) - 1ms`, after all of that
    /// window's timers have drained, if [`DoFnSignature::has_window_expiration`] is set.
    #[allow(unused_variables)]
    fn on_window_expiration(
        &mut self,
        ctx: &mut dyn ElementContext<K>,
        out: &mut dyn OutputReceiver<O>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
