//! Shared data model for the per-key windowing and stateful-runner core.
//!
//! This crate carries only types and small derived queries (`max_timestamp`, `expiration`, pane
//! bookkeeping) — no timer queues, no trigger logic, no state storage. Those live in
//! `streambed-trigger` and `streambed-core`, which depend on this crate rather than the other way
//! around.

pub mod codec;
pub mod element;
pub mod error;
pub mod metrics;
pub mod namespace;
pub mod options;
pub mod strategy;
pub mod time;
pub mod timer;
pub mod window;

pub use codec::{decode_timers, encode_timers};
pub use element::{Element, PaneInfo, WindowedValue};
pub use error::{into_anyhow, CoreError, Result};
pub use metrics::{CountingMetricSink, MetricSink, NoopMetricSink};
pub use namespace::StateNamespace;
pub use options::PipelineOptions;
pub use strategy::{AccumulationMode, ClosingBehavior, OnTimeBehavior, TimestampCombiner};
pub use time::{Timestamp, GC_DELAY_MS, MAX_TIMESTAMP, MIN_TIMESTAMP};
pub use timer::{TimeDomain, Timer, TimerId};
pub use window::Window;
