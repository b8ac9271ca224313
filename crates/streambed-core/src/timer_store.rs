//! Pending timers across the three time domains, ordered for deterministic pop-next-ready.

use std::collections::BTreeMap;
use streambed_types::{CoreError, Result, TimeDomain, Timer, TimerId, Timestamp};

/// One domain's queue: a time-ordered index plus an id index for replace-by-id and cancellation.
#[derive(Default)]
struct DomainQueue {
    by_time: BTreeMap<(Timestamp, u64), TimerId>,
    index: ahash::AHashMap<TimerId, IndexedTimer>,
    watermark: Timestamp,
}

struct IndexedTimer {
    timer: Timer,
    seq: u64,
}

impl DomainQueue {
    fn set(&mut self, timer: Timer, seq_source: &mut u64) {
        let seq = match self.index.get(&timer.id) {
            // Same fire time: keep the original sequence number so this replacement does not
            // jump the tie-break order (I3).
            Some(existing) if existing.timer.timestamp == timer.timestamp => existing.seq,
            Some(existing) => {
                self.by_time.remove(&(existing.timer.timestamp, existing.seq));
                let seq = *seq_source;
                *seq_source += 1;
                seq
            }
            None => {
                let seq = *seq_source;
                *seq_source += 1;
                seq
            }
        };
        self.by_time.insert((timer.timestamp, seq), timer.id.clone());
        self.index.insert(timer.id.clone(), IndexedTimer { timer, seq });
    }

    fn delete(&mut self, id: &TimerId) {
        if let Some(existing) = self.index.remove(id) {
            self.by_time.remove(&(existing.timer.timestamp, existing.seq));
        }
    }

    fn pop_next_ready(&mut self) -> Option<Timer> {
        let (&key, id) = self.by_time.iter().next()?;
        if key.0 > self.watermark {
            return None;
        }
        let id = id.clone();
        self.by_time.remove(&key);
        self.index.remove(&id).map(|entry| entry.timer)
    }

    fn min_output_timestamp(&self) -> Option<Timestamp> {
        self.index.values().map(|e| e.timer.output_timestamp).min()
    }
}

fn domain_name(domain: TimeDomain) -> &'static str {
    match domain {
        TimeDomain::EventTime => "EventTime",
        TimeDomain::ProcessingTime => "ProcessingTime",
        TimeDomain::SyncProcessingTime => "SyncProcessingTime",
    }
}

/// Holds every pending timer for one key, across all three time domains.
///
/// Ordering within a domain is `(timestamp, insertion-sequence)`; the insertion sequence is a
/// single counter shared across domains so relative insertion order is preserved even when timers
/// in different domains happen to share a timestamp.
pub struct TimerStore {
    event_time: DomainQueue,
    processing_time: DomainQueue,
    sync_processing_time: DomainQueue,
    next_seq: u64,
}

impl Default for TimerStore {
    fn default() -> Self {
        Self {
            event_time: DomainQueue {
                watermark: streambed_types::MIN_TIMESTAMP,
                ..Default::default()
            },
            processing_time: DomainQueue {
                watermark: streambed_types::MIN_TIMESTAMP,
                ..Default::default()
            },
            sync_processing_time: DomainQueue {
                watermark: streambed_types::MIN_TIMESTAMP,
                ..Default::default()
            },
            next_seq: 0,
        }
    }
}

impl TimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn domain_mut(&mut self, domain: TimeDomain) -> &mut DomainQueue {
        match domain {
            TimeDomain::EventTime => &mut self.event_time,
            TimeDomain::ProcessingTime => &mut self.processing_time,
            TimeDomain::SyncProcessingTime => &mut self.sync_processing_time,
        }
    }

    /// Sets (or replaces) a timer. A timer with the same id as one already pending supersedes it.
    pub fn set(&mut self, timer: Timer) {
        let domain = timer.id.domain;
        let seq = &mut self.next_seq;
        self.domain_mut(domain).set(timer, seq);
    }

    /// Removes any pending timer with this id. No error if none exists.
    pub fn delete(&mut self, id: &TimerId) {
        self.domain_mut(id.domain).delete(id);
    }

    pub fn remove_next_event_timer(&mut self) -> Option<Timer> {
        self.event_time.pop_next_ready()
    }

    pub fn remove_next_processing_timer(&mut self) -> Option<Timer> {
        self.processing_time.pop_next_ready()
    }

    pub fn remove_next_sync_processing_timer(&mut self) -> Option<Timer> {
        self.sync_processing_time.pop_next_ready()
    }

    fn advance(&mut self, domain: TimeDomain, t: Timestamp) -> Result<()> {
        let q = self.domain_mut(domain);
        if t < q.watermark {
            return Err(CoreError::InvalidWatermark {
                domain: domain_name(domain),
                from: q.watermark,
                to: t,
            });
        }
        q.watermark = t;
        Ok(())
    }

    pub fn advance_input_watermark(&mut self, t: Timestamp) -> Result<()> {
        tracing::trace!(to = t, "advancing input watermark");
        self.advance(TimeDomain::EventTime, t)
    }

    pub fn advance_processing_time(&mut self, t: Timestamp) -> Result<()> {
        self.advance(TimeDomain::ProcessingTime, t)
    }

    pub fn advance_sync_processing_time(&mut self, t: Timestamp) -> Result<()> {
        self.advance(TimeDomain::SyncProcessingTime, t)
    }

    pub fn input_watermark(&self) -> Timestamp {
        self.event_time.watermark
    }

    pub fn processing_time(&self) -> Timestamp {
        self.processing_time.watermark
    }

    pub fn sync_processing_time(&self) -> Timestamp {
        self.sync_processing_time.watermark
    }

    /// `min(inputWatermark, min outputTimestamp hold across all pending timers)`.
    pub fn output_watermark_hold(&self) -> Timestamp {
        [
            self.event_time.min_output_timestamp(),
            self.processing_time.min_output_timestamp(),
            self.sync_processing_time.min_output_timestamp(),
        ]
        .into_iter()
        .flatten()
        .min()
        .map(|hold| hold.min(self.input_watermark()))
        .unwrap_or_else(|| self.input_watermark())
    }

    pub fn is_empty(&self) -> bool {
        self.event_time.index.is_empty()
            && self.processing_time.index.is_empty()
            && self.sync_processing_time.index.is_empty()
    }
}
