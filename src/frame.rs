//! Frame buffer records.
//!
//! - `QueuedFrame`: owned copy of one encoded frame plus its capture timestamp.
//! - `FrameView`: borrowed view handed to the frame handler for the duration of one call.
//!
//! A `QueuedFrame` owns its payload exclusively. The producer's bytes are copied in at
//! enqueue time; the copy lives in the queue until the worker pops it and is released
//! (zeroized, then freed) when the record is dropped. There is no `Clone` and no
//! byte-exposing trait, so exactly one owner exists at any time.

use std::time::Instant;
use zeroize::Zeroize;

// ----------------------------------------------------------------------------
// QueuedFrame: owned frame record
// ----------------------------------------------------------------------------

/// One frame as it travels from producer to worker.
pub struct QueuedFrame {
    /// Private copy of the producer's payload.
    payload: Vec<u8>,

    /// Producer-assigned capture time in microseconds. Not guaranteed monotonic.
    pub timestamp_us: u64,

    /// When set, the admission policy never discards this frame.
    pub no_drop: bool,

    /// Instant the record entered the queue (queue latency, never exported).
    enqueued_at: Instant,
}

// Explicitly NOT implementing Clone or AsRef<[u8]>: the handler only ever sees a FrameView.

impl QueuedFrame {
    /// Build a record from the producer's slice. The slice is copied.
    pub fn copy_from(payload: &[u8], timestamp_us: u64, no_drop: bool) -> Self {
        Self {
            payload: payload.to_vec(),
            timestamp_us,
            no_drop,
            enqueued_at: Instant::now(),
        }
    }

    /// Borrowed view for the frame handler.
    pub fn view(&self) -> FrameView<'_> {
        FrameView { frame: self }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Time spent between enqueue and now.
    pub(crate) fn queued_for(&self) -> std::time::Duration {
        self.enqueued_at.elapsed()
    }
}

impl Drop for QueuedFrame {
    fn drop(&mut self) {
        // Releasing the record releases the payload; scrub it first.
        self.payload.zeroize();
    }
}

impl std::fmt::Debug for QueuedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedFrame")
            .field("len", &self.payload.len())
            .field("timestamp_us", &self.timestamp_us)
            .field("no_drop", &self.no_drop)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// FrameView: what the handler receives
// ----------------------------------------------------------------------------

/// Borrowed view of the frame currently being processed.
///
/// The lifetime ties the payload slice to the handler invocation: the record is
/// released right after the handler returns, so the view cannot outlive it.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    frame: &'a QueuedFrame,
}

impl<'a> FrameView<'a> {
    pub fn payload(&self) -> &'a [u8] {
        &self.frame.payload
    }

    pub fn len(&self) -> usize {
        self.frame.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.payload.is_empty()
    }

    pub fn timestamp_us(&self) -> u64 {
        self.frame.timestamp_us
    }

    pub fn no_drop(&self) -> bool {
        self.frame.no_drop
    }
}

impl std::fmt::Debug for FrameView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.frame, f)
    }
}

// ----------------------------------------------------------------------------
// FrameHandler: the downstream consumer
// ----------------------------------------------------------------------------

/// Downstream consumer of admitted frames (decoder, renderer, ...).
///
/// Called synchronously on the worker thread, one frame at a time. Implementations
/// MUST NOT stash the payload slice; copy what they need inside the call.
pub trait FrameHandler: Send {
    fn handle_frame(&mut self, frame: FrameView<'_>);
}

impl<F> FrameHandler for F
where
    F: FnMut(FrameView<'_>) + Send,
{
    fn handle_frame(&mut self, frame: FrameView<'_>) {
        self(frame)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_owns_a_private_copy() {
        let mut source = vec![1u8, 2, 3, 4];
        let frame = QueuedFrame::copy_from(&source, 42, false);

        // Producer reuses its buffer immediately.
        source.iter_mut().for_each(|b| *b = 0);

        assert_eq!(frame.view().payload(), &[1, 2, 3, 4]);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.timestamp_us, 42);
        assert!(!frame.no_drop);
    }

    #[test]
    fn view_exposes_metadata() {
        let frame = QueuedFrame::copy_from(b"keyframe", 1_000, true);
        let view = frame.view();

        assert_eq!(view.len(), 8);
        assert_eq!(view.timestamp_us(), 1_000);
        assert!(view.no_drop());
    }

    #[test]
    fn closures_are_frame_handlers() {
        let mut seen = Vec::new();
        {
            let mut handler = |frame: FrameView<'_>| seen.push(frame.timestamp_us());
            let frame = QueuedFrame::copy_from(b"x", 7, false);
            handler.handle_frame(frame.view());
        }
        assert_eq!(seen, vec![7]);
    }
}
