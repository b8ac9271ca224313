//! The declarative trigger tree a host hands in once per key.

/// A trigger expression. Compiled into an executable [`crate::machine::TriggerMachine`], which
/// walks this tree once per element arrival, watermark advance, or processing-time tick and
/// persists its own per-node state under the window's namespace.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Ready once the input watermark passes the window's `maxTimestamp`.
    AfterWatermark,
    /// Ready `delay_ms` after the first element this node has seen in the window arrived, in the
    /// processing-time domain.
    AfterProcessingTime(i64),
    /// Ready once at least `n` elements have reached this node.
    AfterCount(u64),
    /// Fires each child once, in order; closes once every child has fired.
    AfterEach(Vec<Trigger>),
    /// Re-arms its child every time it fires; never closes on its own.
    Repeatedly(Box<Trigger>),
    /// Fires whenever `main` or `until` is ready; once `until` fires, the whole node closes
    /// regardless of `main`'s state.
    OrFinally { main: Box<Trigger>, until: Box<Trigger> },
    /// Never fires.
    Never,
    /// Ready immediately.
    Always,
}

impl Trigger {
    pub fn after_each(children: impl IntoIterator<Item = Trigger>) -> Self {
        Trigger::AfterEach(children.into_iter().collect())
    }

    pub fn repeatedly(inner: Trigger) -> Self {
        Trigger::Repeatedly(Box::new(inner))
    }

    pub fn or_finally(main: Trigger, until: Trigger) -> Self {
        Trigger::OrFinally {
            main: Box::new(main),
            until: Box::new(until),
        }
    }
}
