//! The consumer thread.
//!
//! States:
//! - `AwaitingFirstFrame`: block until any frame arrives and hand it to the handler
//!   unconditionally. Its timestamp becomes the baseline for the policy.
//! - `Running`: dequeue, ask the policy, call the handler on `Process`, then move the
//!   baseline to this frame's timestamp whether or not it was processed.
//! - `Stopped`: the running flag was cleared. Frames still queued are left for the
//!   controller to release.
//!
//! The handler runs inline on this thread; nothing here spawns further work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::frame::{FrameHandler, QueuedFrame};
use crate::policy::{AdmissionPolicy, Candidate, Decision, DropReason};
use crate::queue::{Dequeued, FrameQueue};
use crate::stats::QueueStats;

/// How often the worker reports queue depth at debug level.
const DEPTH_LOG_INTERVAL: Duration = Duration::from_millis(500);

/// State shared by the controller, the producer handle and the worker thread.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) queue: FrameQueue,
    pub(crate) running: AtomicBool,
    pub(crate) stats: QueueStats,
}

impl Shared {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn enqueue(&self, payload: &[u8], timestamp_us: u64, no_drop: bool) {
        self.queue.enqueue(payload, timestamp_us, no_drop);
        self.stats.record_enqueued();
    }

    /// Drop the frame (zeroizing its payload) and count the release.
    pub(crate) fn release(&self, frame: QueuedFrame) {
        drop(frame);
        self.stats.record_released();
    }
}

/// Frame currently owned by the worker. Dropping the guard releases the frame and
/// counts it, on the normal path and when unwinding out of the handler alike.
struct InFlight<'a> {
    shared: &'a Shared,
    frame: QueuedFrame,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // The frame field is dropped (and zeroized) right after this.
        self.shared.stats.record_released();
    }
}

/// Clears the running flag if the worker unwinds, so producers stop seeing a live
/// consumer.
struct StopOnUnwind<'a>(&'a Shared);

impl Drop for StopOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.running.store(false, Ordering::SeqCst);
            log::error!("frame handler panicked; frame worker stopped");
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WorkerState {
    AwaitingFirstFrame,
    Running { last_us: u64 },
    Stopped,
}

/// Worker thread body. Returns once the running flag is cleared.
pub(crate) fn run_worker(
    shared: &Shared,
    policy: AdmissionPolicy,
    handler: &mut dyn FrameHandler,
) {
    let _unwind = StopOnUnwind(shared);
    let mut state = WorkerState::AwaitingFirstFrame;
    let mut last_depth_log = Instant::now();

    log::info!(
        "frame worker started (max queue depth {})",
        policy.max_depth()
    );

    loop {
        state = match state {
            WorkerState::AwaitingFirstFrame => match await_first_frame(shared) {
                Some(frame) => {
                    let held = InFlight { shared, frame };
                    process(shared, handler, &held.frame);
                    WorkerState::Running {
                        last_us: held.frame.timestamp_us,
                    }
                }
                None => WorkerState::Stopped,
            },
            WorkerState::Running { last_us } => {
                if !shared.is_running() {
                    WorkerState::Stopped
                } else {
                    let Some(Dequeued { frame, depth }) = shared.queue.dequeue() else {
                        shared.stats.record_empty_wakeup();
                        continue;
                    };
                    let held = InFlight { shared, frame };
                    let frame = &held.frame;

                    if last_depth_log.elapsed() >= DEPTH_LOG_INTERVAL {
                        log::debug!(
                            "queue depth is at {} (~{} KB queued)",
                            depth,
                            shared.queue.memory_bytes() / 1024
                        );
                        last_depth_log = Instant::now();
                    }

                    let decision = policy.decide(Candidate {
                        timestamp_us: frame.timestamp_us,
                        no_drop: frame.no_drop,
                        last_us,
                        depth,
                    });
                    match decision {
                        Decision::Process => process(shared, handler, frame),
                        Decision::Drop(reason) => report_drop(shared, reason, frame, last_us),
                    }

                    // Baseline follows the last frame seen, processed or not.
                    WorkerState::Running {
                        last_us: frame.timestamp_us,
                    }
                }
            }
            WorkerState::Stopped => break,
        };
    }

    log::info!("frame worker stopped");
}

/// Block until the first frame arrives, or return `None` once stopped.
fn await_first_frame(shared: &Shared) -> Option<QueuedFrame> {
    loop {
        if !shared.is_running() {
            return None;
        }
        match shared.queue.dequeue() {
            Some(Dequeued { frame, .. }) => return Some(frame),
            None => shared.stats.record_empty_wakeup(),
        }
    }
}

fn process(shared: &Shared, handler: &mut dyn FrameHandler, frame: &QueuedFrame) {
    let started = Instant::now();
    handler.handle_frame(frame.view());
    let took = started.elapsed();
    shared.stats.record_processed(took);
    log::trace!(
        "processed frame ts={} len={} queued={:?} handler={:?}",
        frame.timestamp_us,
        frame.len(),
        frame.queued_for(),
        took
    );
}

fn report_drop(shared: &Shared, reason: DropReason, frame: &QueuedFrame, last_us: u64) {
    match reason {
        DropReason::Stale {
            timestamp_us,
            last_us,
        } => {
            shared.stats.record_dropped_stale();
            log::warn!(
                "dropping frame because frame time {} is less than the last frame time {}",
                timestamp_us,
                last_us
            );
        }
        DropReason::Backlog { depth } => {
            shared.stats.record_dropped_backlog();
            log::warn!(
                "dropped frame at {}us after the previous one because queue depth was {}",
                frame.timestamp_us.saturating_sub(last_us),
                depth
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameView;

    fn running_shared() -> Shared {
        let shared = Shared::default();
        shared.running.store(true, Ordering::SeqCst);
        shared
    }

    #[test]
    fn stopped_before_first_frame_returns_immediately() {
        let shared = Shared::default();
        let mut calls = 0u32;
        let mut handler = |_: FrameView<'_>| calls += 1;

        run_worker(&shared, AdmissionPolicy::default(), &mut handler);

        assert_eq!(calls, 0);
    }

    #[test]
    fn first_frame_is_processed_unconditionally() {
        let shared = std::sync::Arc::new(running_shared());
        // Backlog far beyond the threshold: the first frame still goes through.
        for ts in 0..20u64 {
            shared.enqueue(b"f", ts, false);
        }

        let worker = {
            let shared = std::sync::Arc::clone(&shared);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                let mut handler = |frame: FrameView<'_>| {
                    seen.push(frame.timestamp_us());
                    if frame.timestamp_us() == 19 {
                        shared.running.store(false, Ordering::SeqCst);
                    }
                };
                run_worker(&shared, AdmissionPolicy::new(1), &mut handler);
                seen
            })
        };

        let seen = worker.join().expect("worker thread");
        // Depth after popping ts=0 is 19, yet it is processed. Subsequent frames
        // shed until at most one frame remains behind.
        assert_eq!(seen, vec![0, 18, 19]);
        let stats = shared.stats.snapshot();
        assert_eq!(stats.dropped_backlog, 17);
        assert_eq!(stats.released, 20);
    }

    #[test]
    fn handler_panic_clears_running_and_counts_the_frame() {
        let shared = std::sync::Arc::new(running_shared());
        for ts in 1..=3u64 {
            shared.enqueue(b"f", ts, false);
        }

        let worker = {
            let shared = std::sync::Arc::clone(&shared);
            std::thread::spawn(move || {
                let mut handler = |frame: FrameView<'_>| {
                    if frame.timestamp_us() == 2 {
                        panic!("handler failure");
                    }
                };
                run_worker(&shared, AdmissionPolicy::default(), &mut handler);
            })
        };

        assert!(worker.join().is_err());
        assert!(!shared.is_running());
        let stats = shared.stats.snapshot();
        assert_eq!(stats.processed, 1);
        // ts=1 after processing, ts=2 during the unwind; ts=3 is still queued.
        assert_eq!(stats.released, 2);
        assert_eq!(shared.queue.len(), 1);
    }
}
