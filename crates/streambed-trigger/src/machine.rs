//! The executable trigger: walks a [`Trigger`] tree, persisting one small state record per node
//! under the window's namespace. The machine never touches user state — every cell it reads or
//! writes lives under ids prefixed `__trigger/`, so a user's own state ids never collide with it.

use crate::tree::Trigger;
use streambed_state::StateStore;
use streambed_types::{Result, StateNamespace, Timestamp, Window};

const ROOT_PATH: &str = "__trigger";

/// Per-node bookkeeping. Which fields are meaningful depends on the node kind: `count` doubles as
/// the "how many elements" counter for `AfterCount` and as the "which child is active" pointer
/// for `AfterEach`.
#[derive(Debug, Clone, Default)]
struct NodeState {
    count: u64,
    deadline: Option<Timestamp>,
    closed: bool,
}

/// Host-supplied callbacks the machine needs to schedule processing-time timers. Event-time
/// readiness is evaluated directly against the watermark the caller passes in, since the
/// end-of-window timer is already owned by the runner, not the trigger machine.
pub trait TriggerContext {
    fn schedule_processing_timer(&mut self, window: Window, at: Timestamp);
}

/// A no-op context for callers that only care about watermark-driven triggers in tests.
#[derive(Debug, Default)]
pub struct NullTriggerContext;

impl TriggerContext for NullTriggerContext {
    fn schedule_processing_timer(&mut self, _window: Window, _at: Timestamp) {}
}

/// An executable trigger compiled from a declarative [`Trigger`] tree.
pub struct TriggerMachine {
    root: Trigger,
}

impl TriggerMachine {
    pub fn new(root: Trigger) -> Self {
        Self { root }
    }

    /// Registers one element's arrival in `window`. May arm a processing-time timer through
    /// `ctx` the first time an `AfterProcessingTime` node is touched for this window.
    pub fn on_element(
        &self,
        state: &mut StateStore,
        window: Window,
        now_processing_time: Timestamp,
        ctx: &mut dyn TriggerContext,
    ) -> Result<()> {
        Self::element_node(&self.root, state, window, ROOT_PATH, now_processing_time, ctx)
    }

    fn element_node(
        node: &Trigger,
        state: &mut StateStore,
        window: Window,
        path: &str,
        now_pt: Timestamp,
        ctx: &mut dyn TriggerContext,
    ) -> Result<()> {
        match node {
            Trigger::Never | Trigger::Always | Trigger::AfterWatermark => Ok(()),
            Trigger::AfterCount(_) => {
                let mut s = Self::read(state, window, path)?;
                s.count += 1;
                Self::write(state, window, path, s)
            }
            Trigger::AfterProcessingTime(delay_ms) => {
                let mut s = Self::read(state, window, path)?;
                if s.deadline.is_none() {
                    let deadline = now_pt.saturating_add(*delay_ms);
                    s.deadline = Some(deadline);
                    Self::write(state, window, path, s)?;
                    ctx.schedule_processing_timer(window, deadline);
                }
                Ok(())
            }
            Trigger::AfterEach(children) => {
                let s = Self::read(state, window, path)?;
                let idx = s.count as usize;
                if let Some(child) = children.get(idx) {
                    Self::element_node(child, state, window, &child_path(path, idx), now_pt, ctx)?;
                }
                Ok(())
            }
            Trigger::Repeatedly(inner) => {
                Self::element_node(inner, state, window, &child_path(path, 0), now_pt, ctx)
            }
            Trigger::OrFinally { main, until } => {
                Self::element_node(main, state, window, &child_path(path, 0), now_pt, ctx)?;
                Self::element_node(until, state, window, &child_path(path, 1), now_pt, ctx)
            }
        }
    }

    /// Whether `window` should fire right now, given the current watermark and processing time.
    pub fn should_fire(
        &self,
        state: &mut StateStore,
        window: Window,
        input_watermark: Timestamp,
        now_processing_time: Timestamp,
    ) -> Result<bool> {
        Self::ready(&self.root, state, window, ROOT_PATH, input_watermark, now_processing_time)
    }

    fn ready(
        node: &Trigger,
        state: &mut StateStore,
        window: Window,
        path: &str,
        wm: Timestamp,
        pt: Timestamp,
    ) -> Result<bool> {
        match node {
            Trigger::Never => Ok(false),
            Trigger::Always => Ok(true),
            Trigger::AfterWatermark => Ok(wm >= window.max_timestamp()),
            Trigger::AfterCount(n) => Ok(Self::read(state, window, path)?.count >= *n),
            Trigger::AfterProcessingTime(_) => {
                Ok(Self::read(state, window, path)?.deadline.map(|d| pt >= d).unwrap_or(false))
            }
            Trigger::AfterEach(children) => {
                let s = Self::read(state, window, path)?;
                let idx = s.count as usize;
                match children.get(idx) {
                    Some(child) => Self::ready(child, state, window, &child_path(path, idx), wm, pt),
                    None => Ok(false),
                }
            }
            Trigger::Repeatedly(inner) => Self::ready(inner, state, window, &child_path(path, 0), wm, pt),
            Trigger::OrFinally { main, until } => {
                let m = Self::ready(main, state, window, &child_path(path, 0), wm, pt)?;
                let u = Self::ready(until, state, window, &child_path(path, 1), wm, pt)?;
                Ok(m || u)
            }
        }
    }

    /// Notifies the machine that a timer it scheduled has fired, returning whether the window is
    /// now ready. Event-time end-of-window timers and processing-time deadlines both funnel
    /// through here; the machine itself keeps no separate timer bookkeeping beyond the deadline
    /// it already records in `on_element`.
    pub fn on_timer(
        &self,
        state: &mut StateStore,
        window: Window,
        input_watermark: Timestamp,
        now_processing_time: Timestamp,
    ) -> Result<bool> {
        self.should_fire(state, window, input_watermark, now_processing_time)
    }

    /// Acknowledges a firing: leaf nodes close so they won't fire again; `Repeatedly` resets its
    /// child's whole subtree so it can become ready again; `OrFinally` closes permanently once
    /// its `until` branch is the one that fired.
    pub fn on_fire(
        &self,
        state: &mut StateStore,
        window: Window,
        input_watermark: Timestamp,
        now_processing_time: Timestamp,
    ) -> Result<()> {
        Self::fire(&self.root, state, window, ROOT_PATH, input_watermark, now_processing_time)
    }

    fn fire(
        node: &Trigger,
        state: &mut StateStore,
        window: Window,
        path: &str,
        wm: Timestamp,
        pt: Timestamp,
    ) -> Result<()> {
        match node {
            Trigger::Never => Ok(()),
            Trigger::Always | Trigger::AfterWatermark | Trigger::AfterCount(_) | Trigger::AfterProcessingTime(_) => {
                let mut s = Self::read(state, window, path)?;
                s.closed = true;
                Self::write(state, window, path, s)
            }
            Trigger::AfterEach(children) => {
                let mut s = Self::read(state, window, path)?;
                s.count += 1;
                if s.count as usize >= children.len() {
                    s.closed = true;
                }
                Self::write(state, window, path, s)
            }
            Trigger::Repeatedly(inner) => Self::reset_subtree(inner, state, window, &child_path(path, 0)),
            Trigger::OrFinally { main, until } => {
                let until_path = child_path(path, 1);
                if Self::ready(until, state, window, &until_path, wm, pt)? {
                    Self::fire(until, state, window, &until_path, wm, pt)?;
                    let mut s = Self::read(state, window, path)?;
                    s.closed = true;
                    Self::write(state, window, path, s)
                } else {
                    Self::fire(main, state, window, &child_path(path, 0), wm, pt)
                }
            }
        }
    }

    fn reset_subtree(node: &Trigger, state: &mut StateStore, window: Window, path: &str) -> Result<()> {
        Self::write(state, window, path, NodeState::default())?;
        match node {
            Trigger::AfterEach(children) => {
                for (i, child) in children.iter().enumerate() {
                    Self::reset_subtree(child, state, window, &child_path(path, i))?;
                }
            }
            Trigger::Repeatedly(inner) => Self::reset_subtree(inner, state, window, &child_path(path, 0))?,
            Trigger::OrFinally { main, until } => {
                Self::reset_subtree(main, state, window, &child_path(path, 0))?;
                Self::reset_subtree(until, state, window, &child_path(path, 1))?;
            }
            Trigger::Never | Trigger::Always | Trigger::AfterWatermark | Trigger::AfterCount(_)
            | Trigger::AfterProcessingTime(_) => {}
        }
        Ok(())
    }

    /// True once this window's trigger has reached its closed (no-more-firings) state.
    pub fn is_closed(&self, state: &mut StateStore, window: Window) -> Result<bool> {
        Ok(Self::read(state, window, ROOT_PATH)?.closed)
    }

    /// Reconciles trigger state across a window merge: counts sum, deadlines take the earliest
    /// pending one (rescheduling it against the merged window), and closed flags are OR'd, since
    /// a source window that already finished should keep the merged window from re-firing that
    /// branch.
    pub fn on_merge(
        &self,
        state: &mut StateStore,
        from: &[Window],
        to: Window,
        ctx: &mut dyn TriggerContext,
    ) -> Result<()> {
        Self::merge_node(&self.root, state, from, to, ROOT_PATH, ctx)
    }

    fn merge_node(
        node: &Trigger,
        state: &mut StateStore,
        from: &[Window],
        to: Window,
        path: &str,
        ctx: &mut dyn TriggerContext,
    ) -> Result<()> {
        match node {
            Trigger::Never | Trigger::Always | Trigger::AfterWatermark => Ok(()),
            Trigger::AfterCount(_) => {
                let mut merged = Self::read(state, to, path)?;
                for w in from {
                    let s = Self::read(state, *w, path)?;
                    merged.count += s.count;
                    merged.closed = merged.closed || s.closed;
                }
                Self::write(state, to, path, merged)
            }
            Trigger::AfterProcessingTime(_) => {
                let mut merged = Self::read(state, to, path)?;
                for w in from {
                    let s = Self::read(state, *w, path)?;
                    merged.closed = merged.closed || s.closed;
                    merged.deadline = match (merged.deadline, s.deadline) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, None) => a,
                        (None, b) => b,
                    };
                }
                if !merged.closed {
                    if let Some(deadline) = merged.deadline {
                        ctx.schedule_processing_timer(to, deadline);
                    }
                }
                Self::write(state, to, path, merged)
            }
            Trigger::AfterEach(children) => {
                for (i, child) in children.iter().enumerate() {
                    Self::merge_node(child, state, from, to, &child_path(path, i), ctx)?;
                }
                let mut merged = Self::read(state, to, path)?;
                let mut max_idx = merged.count;
                for w in from {
                    let s = Self::read(state, *w, path)?;
                    max_idx = max_idx.max(s.count);
                    merged.closed = merged.closed || s.closed;
                }
                merged.count = max_idx;
                if merged.count as usize >= children.len() {
                    merged.closed = true;
                }
                Self::write(state, to, path, merged)
            }
            Trigger::Repeatedly(inner) => Self::merge_node(inner, state, from, to, &child_path(path, 0), ctx),
            Trigger::OrFinally { main, until } => {
                Self::merge_node(main, state, from, to, &child_path(path, 0), ctx)?;
                Self::merge_node(until, state, from, to, &child_path(path, 1), ctx)?;
                let mut merged = Self::read(state, to, path)?;
                for w in from {
                    let s = Self::read(state, *w, path)?;
                    merged.closed = merged.closed || s.closed;
                }
                Self::write(state, to, path, merged)
            }
        }
    }

    fn read(state: &mut StateStore, window: Window, path: &str) -> Result<NodeState> {
        Ok(state
            .value_cell::<NodeState>(StateNamespace::window(window), path)?
            .read()
            .cloned()
            .unwrap_or_default())
    }

    fn write(state: &mut StateStore, window: Window, path: &str, value: NodeState) -> Result<()> {
        state
            .value_cell::<NodeState>(StateNamespace::window(window), path)?
            .write(value);
        Ok(())
    }
}

fn child_path(path: &str, idx: usize) -> String {
    format!("{path}.{idx}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use streambed_types::Window;

    fn window() -> Window {
        Window::new(0, 10)
    }

    #[test]
    fn after_count_fires_once_threshold_reached() {
        let machine = TriggerMachine::new(Trigger::AfterCount(2));
        let mut store = StateStore::new();
        let w = window();
        let mut ctx = NullTriggerContext;

        machine.on_element(&mut store, w, 0, &mut ctx).unwrap();
        assert!(!machine.should_fire(&mut store, w, 0, 0).unwrap());

        machine.on_element(&mut store, w, 0, &mut ctx).unwrap();
        assert!(machine.should_fire(&mut store, w, 0, 0).unwrap());
    }

    #[test]
    fn bare_trigger_closes_after_firing() {
        let machine = TriggerMachine::new(Trigger::AfterWatermark);
        let mut store = StateStore::new();
        let w = window();
        let mut ctx = NullTriggerContext;

        assert!(machine.should_fire(&mut store, w, 9, 0).unwrap());
        machine.on_fire(&mut store, w, 9, 0).unwrap();
        assert!(machine.is_closed(&mut store, w).unwrap());
    }

    #[test]
    fn repeatedly_rearms_after_firing() {
        let machine = TriggerMachine::new(Trigger::repeatedly(Trigger::AfterCount(1)));
        let mut store = StateStore::new();
        let w = window();
        let mut ctx = NullTriggerContext;

        machine.on_element(&mut store, w, 0, &mut ctx).unwrap();
        assert!(machine.should_fire(&mut store, w, 0, 0).unwrap());
        machine.on_fire(&mut store, w, 0, 0).unwrap();
        assert!(!machine.is_closed(&mut store, w).unwrap());
        assert!(!machine.should_fire(&mut store, w, 0, 0).unwrap());

        machine.on_element(&mut store, w, 0, &mut ctx).unwrap();
        assert!(machine.should_fire(&mut store, w, 0, 0).unwrap());
    }

    #[test]
    fn or_finally_closes_permanently_once_until_fires() {
        let machine = TriggerMachine::new(Trigger::or_finally(
            Trigger::repeatedly(Trigger::AfterCount(1)),
            Trigger::AfterCount(3),
        ));
        let mut store = StateStore::new();
        let w = window();
        let mut ctx = NullTriggerContext;

        for _ in 0..3 {
            machine.on_element(&mut store, w, 0, &mut ctx).unwrap();
        }
        assert!(machine.should_fire(&mut store, w, 0, 0).unwrap());
        machine.on_fire(&mut store, w, 0, 0).unwrap();
        assert!(machine.is_closed(&mut store, w).unwrap());
    }
}
