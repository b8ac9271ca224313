//! Timer identity and the three time domains timers live in.

use crate::namespace::StateNamespace;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The time domain a timer fires in. Event time is driven by the input watermark; the other two
/// are driven by the host's notion of wall-clock progress during batch execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeDomain {
    EventTime,
    ProcessingTime,
    SyncProcessingTime,
}

/// Identifies a timer uniquely within one key's pipeline. Setting a timer with an identical id
/// supersedes any previously pending timer with that id.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId {
    pub namespace: StateNamespace,
    pub timer_name: String,
    pub family: String,
    pub domain: TimeDomain,
}

impl TimerId {
    pub fn new(
        namespace: StateNamespace,
        timer_name: impl Into<String>,
        family: impl Into<String>,
        domain: TimeDomain,
    ) -> Self {
        Self {
            namespace,
            timer_name: timer_name.into(),
            family: family.into(),
            domain,
        }
    }

    /// The family streambed-core reserves for its own internal timers (GC, sort-flush, end of
    /// window), so user-declared timer families never collide with them.
    pub const INTERNAL_FAMILY: &'static str = "__streambed_internal";

    pub fn internal(namespace: StateNamespace, timer_name: impl Into<String>, domain: TimeDomain) -> Self {
        Self::new(namespace, timer_name, Self::INTERNAL_FAMILY, domain)
    }
}

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimerId({:?}, {:?}/{:?}, {:?})",
            self.namespace, self.family, self.timer_name, self.domain
        )
    }
}

/// A pending timer: the fire instant, plus the hold it places on the output watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    pub timestamp: Timestamp,
    pub output_timestamp: Timestamp,
}

impl Timer {
    pub fn new(id: TimerId, timestamp: Timestamp) -> Self {
        Self {
            id,
            timestamp,
            output_timestamp: timestamp,
        }
    }

    pub fn with_output_timestamp(mut self, output_timestamp: Timestamp) -> Self {
        self.output_timestamp = output_timestamp;
        self
    }
}
