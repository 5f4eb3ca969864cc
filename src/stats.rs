//! Worker counters.
//!
//! Written by the producer (`enqueued`) and the worker (everything else), read from
//! any thread through `snapshot`. Counters are independent, so a snapshot taken while
//! the worker runs may be mid-frame; after `stop` it is exact and
//! `enqueued == released` holds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct QueueStats {
    enqueued: AtomicU64,
    processed: AtomicU64,
    dropped_stale: AtomicU64,
    dropped_backlog: AtomicU64,
    abandoned: AtomicU64,
    released: AtomicU64,
    empty_wakeups: AtomicU64,
    last_processing_us: AtomicU64,
}

impl QueueStats {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self, took: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.last_processing_us
            .store(duration_us(took), Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_stale(&self) {
        self.dropped_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_backlog(&self) {
        self.dropped_backlog.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self, count: u64) {
        self.abandoned.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_wakeup(&self) {
        self.empty_wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            dropped_stale: self.dropped_stale.load(Ordering::Relaxed),
            dropped_backlog: self.dropped_backlog.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            empty_wakeups: self.empty_wakeups.load(Ordering::Relaxed),
            last_processing: Duration::from_micros(
                self.last_processing_us.load(Ordering::Relaxed),
            ),
        }
    }
}

/// Point-in-time copy of `QueueStats`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub processed: u64,
    pub dropped_stale: u64,
    pub dropped_backlog: u64,
    /// Frames still queued at shutdown, released without processing.
    pub abandoned: u64,
    /// Payloads released, whatever the outcome.
    pub released: u64,
    pub empty_wakeups: u64,
    /// Handler wall-clock time for the most recent processed frame.
    pub last_processing: Duration,
}

impl StatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.dropped_stale + self.dropped_backlog
    }
}

fn duration_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
