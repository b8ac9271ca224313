//! The output sink boundary: a synchronous push receiver invoked from inside `processElement`,
//! `onTimer`, or pane emission.

use streambed_types::WindowedValue;

/// A push sink for windowed values, optionally tagged for multi-output DoFns. Hosts implement this
/// to fan outputs into their own downstream plumbing; `VecOutputReceiver` below is the in-memory
/// implementation used by tests.
pub trait OutputReceiver<V> {
    fn push(&mut self, tag: Option<&str>, value: WindowedValue<V>);
}

/// Collects every pushed output in arrival order, tag included. Used by tests and by any host
/// that just wants to materialize a key's full output rather than stream it onward.
#[derive(Debug)]
pub struct VecOutputReceiver<V> {
    pub outputs: Vec<(Option<String>, WindowedValue<V>)>,
}

impl<V> Default for VecOutputReceiver<V> {
    fn default() -> Self {
        Self { outputs: Vec::new() }
    }
}

impl<V> OutputReceiver<V> for VecOutputReceiver<V> {
    fn push(&mut self, tag: Option<&str>, value: WindowedValue<V>) {
        self.outputs.push((tag.map(str::to_string), value));
    }
}

impl<V> VecOutputReceiver<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outputs pushed under no tag (or any tag, if the caller doesn't care), in arrival order.
    pub fn values(&self) -> impl Iterator<Item = &WindowedValue<V>> {
        self.outputs.iter().map(|(_, v)| v)
    }
}
