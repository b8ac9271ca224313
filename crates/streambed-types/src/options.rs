//! Host-supplied configuration. The core reads these fields and nothing else; it never parses a
//! file or an environment variable itself — that plumbing belongs to the host.

use crate::metrics::MetricSink;
use serde::{Deserialize, Serialize};

/// Options the host constructs once per pipeline (or per test) and passes into the runners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// When set, every `MetricSink` call is skipped rather than forwarded.
    #[serde(default)]
    pub disable_metrics: bool,
    /// Overrides the allowed lateness carried on the windowing strategy, for hosts that want a
    /// single knob across all windowed stages without re-deriving each strategy.
    #[serde(default)]
    pub allowed_lateness_override_ms: Option<i64>,
    /// Enables event-time sorted delivery in `StatefulRunner` for DoFns that declare
    /// `requires_time_sorted_input`.
    #[serde(default)]
    pub ordering_enabled: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            disable_metrics: false,
            allowed_lateness_override_ms: None,
            ordering_enabled: false,
        }
    }
}

impl PipelineOptions {
    pub fn effective_allowed_lateness(&self, strategy_allowed_lateness_ms: i64) -> i64 {
        self.allowed_lateness_override_ms
            .unwrap_or(strategy_allowed_lateness_ms)
    }

    /// Forwards `sink.inc(name, n)` unless `disable_metrics` is set. The one place every runner
    /// consults the flag, so a call site never has to branch on it itself.
    pub fn record_metric(&self, sink: &dyn MetricSink, name: &str, n: u64) {
        if !self.disable_metrics {
            sink.inc(name, n);
        }
    }
}
