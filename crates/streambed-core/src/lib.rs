//! The per-key windowing, triggering, and stateful-element-processing core: everything a host
//! needs to turn a finite, already-keyed batch of timestamped elements into windowed panes or
//! stateful-DoFn output, driven synchronously to completion with no internal suspension points.

pub mod batch_driver;
pub mod dofn;
pub mod output;
pub mod reduce_fn_runner;
pub mod stateful_runner;
pub mod strategy;
pub mod timer_store;
pub mod window_fn;

pub use batch_driver::{BatchDriver, TimerDriven};
pub use dofn::{DoFn, DoFnSignature, ElementContext};
pub use output::{OutputReceiver, VecOutputReceiver};
pub use reduce_fn_runner::{ReduceFnRunner, ReduceFnRunnerDrain};
pub use stateful_runner::{StatefulRunner, StatefulRunnerDrain};
pub use strategy::WindowingStrategy;
pub use timer_store::TimerStore;
pub use window_fn::{FixedWindows, GlobalWindows, MergeAction, SessionWindows, SlidingWindows, WindowFn};
