//! Qualifiers under which state cells and timers live.

use crate::window::Window;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The qualifier under which a state cell or timer is scoped: either a specific window, or the
/// global namespace used by per-key (not per-window) bookkeeping.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateNamespace {
    Window(Window),
    Global,
}

impl StateNamespace {
    pub fn window(w: Window) -> Self {
        StateNamespace::Window(w)
    }

    pub fn as_window(&self) -> Option<Window> {
        match self {
            StateNamespace::Window(w) => Some(*w),
            StateNamespace::Global => None,
        }
    }
}

impl fmt::Debug for StateNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateNamespace::Window(w) => write!(f, "{:?}", w),
            StateNamespace::Global => write!(f, "Global"),
        }
    }
}

impl From<Window> for StateNamespace {
    fn from(w: Window) -> Self {
        StateNamespace::Window(w)
    }
}
