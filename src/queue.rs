//! Frame handoff queue.
//!
//! `FrameQueue` is an unbounded FIFO of `QueuedFrame`s shared by exactly one
//! producer and one consumer:
//! - `enqueue` copies the payload, appends under the lock, then releases the
//!   semaphore once. It never waits on queue size.
//! - `dequeue` pops immediately when frames are present. Otherwise it parks on
//!   the semaphore (outside the lock), relocks, and returns `None` when woken
//!   with nothing to pop (a shutdown wakeup or a leftover permit).
//!
//! Backpressure is not expressed here; the worker sheds load through the
//! admission policy instead.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::frame::QueuedFrame;
use crate::sync::Semaphore;

/// A frame popped from the queue together with the depth left behind it.
#[derive(Debug)]
pub struct Dequeued {
    pub frame: QueuedFrame,
    /// Frames still queued after this pop.
    pub depth: usize,
}

#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: Mutex<VecDeque<QueuedFrame>>,
    available: Semaphore,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `payload` into a new record and append it. Safe to call from the producer
    /// thread while the worker is dequeuing.
    pub fn enqueue(&self, payload: &[u8], timestamp_us: u64, no_drop: bool) {
        // Copy outside the lock; only the push is serialized.
        let frame = QueuedFrame::copy_from(payload, timestamp_us, no_drop);
        self.push(frame);
    }

    /// Append an already-built record.
    pub fn push(&self, frame: QueuedFrame) {
        self.lock().push_back(frame);
        self.available.release();
    }

    /// Pop the head frame, blocking while the queue is empty.
    ///
    /// Returns `None` when woken without a frame to pop. Callers loop on `None`
    /// after checking whatever stop condition they have.
    pub fn dequeue(&self) -> Option<Dequeued> {
        {
            let mut frames = self.lock();
            if let Some(frame) = frames.pop_front() {
                return Some(Dequeued {
                    frame,
                    depth: frames.len(),
                });
            }
        }

        // Lock is released before parking so the producer can keep appending.
        self.available.acquire();

        let mut frames = self.lock();
        let frame = frames.pop_front()?;
        Some(Dequeued {
            frame,
            depth: frames.len(),
        })
    }

    /// Release the handoff signal without a frame. Unblocks a parked `dequeue`,
    /// which then returns `None`.
    pub fn wake(&self) {
        self.available.release();
    }

    /// Remove every queued frame, in FIFO order.
    pub fn drain(&self) -> Vec<QueuedFrame> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total queued payload bytes.
    pub fn memory_bytes(&self) -> usize {
        self.lock().iter().map(QueuedFrame::len).sum()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueuedFrame>> {
        // push_back/pop_front never leave the deque torn; recover from poisoning.
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn frames_come_out_in_enqueue_order() {
        let queue = FrameQueue::new();
        for ts in [30u64, 10, 20, 40] {
            queue.enqueue(&ts.to_le_bytes(), ts, false);
        }

        let order: Vec<u64> = (0..4)
            .map(|_| queue.dequeue().expect("frame").frame.timestamp_us)
            .collect();
        assert_eq!(order, vec![30, 10, 20, 40]);
        assert!(queue.is_empty());
    }

    #[test]
    fn dequeue_reports_depth_after_pop() {
        let queue = FrameQueue::new();
        for ts in 0..3u64 {
            queue.enqueue(b"frame", ts, false);
        }

        let first = queue.dequeue().expect("frame");
        assert_eq!(first.depth, 2);
        let second = queue.dequeue().expect("frame");
        assert_eq!(second.depth, 1);
        let third = queue.dequeue().expect("frame");
        assert_eq!(third.depth, 0);
    }

    #[test]
    fn dequeue_blocks_until_enqueue() {
        let queue = Arc::new(FrameQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.dequeue())
        };

        std::thread::sleep(Duration::from_millis(30));
        assert!(!consumer.is_finished(), "dequeue must block on an empty queue");

        queue.enqueue(b"marker", 77, true);
        let got = consumer
            .join()
            .expect("consumer thread")
            .expect("woken with a frame");
        assert_eq!(got.frame.timestamp_us, 77);
        assert!(got.frame.no_drop);
        assert_eq!(got.frame.view().payload(), b"marker");
        assert_eq!(got.depth, 0);
    }

    #[test]
    fn wake_without_frame_returns_none() {
        let queue = Arc::new(FrameQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.dequeue().is_none())
        };

        std::thread::sleep(Duration::from_millis(20));
        queue.wake();
        assert!(consumer.join().expect("consumer thread"));
    }

    #[test]
    fn fast_path_leaves_permits_for_later_empty_wakeups() {
        let queue = FrameQueue::new();
        queue.enqueue(b"a", 1, false);
        queue.enqueue(b"b", 2, false);

        assert!(queue.dequeue().is_some());
        assert!(queue.dequeue().is_some());

        // Both pops took the fast path; the two permits surface as empty wakeups.
        assert!(queue.dequeue().is_none());
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn drain_empties_the_queue() {
        let queue = FrameQueue::new();
        queue.enqueue(&[0u8; 16], 1, false);
        queue.enqueue(&[0u8; 8], 2, false);
        assert_eq!(queue.memory_bytes(), 24);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].timestamp_us, 1);
        assert!(queue.is_empty());
    }
}
