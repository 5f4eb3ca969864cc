//! vframe-queue
//!
//! Decouples a real-time video frame producer from one expensive consumer.
//!
//! # Architecture
//!
//! The producer calls `enqueue` from its own thread; the payload is copied and the
//! call returns without waiting on the consumer. A single worker thread pops frames
//! in FIFO order and decides, per frame, whether the handler sees it:
//!
//! 1. **Forced frames** (`no_drop`) are always processed.
//! 2. **Stale frames** (timestamp older than the previous frame) are dropped.
//! 3. **Backlog shedding**: a frame with more than `max_depth` frames queued behind
//!    it is dropped so the consumer catches up.
//!
//! The first frame after `start` is processed unconditionally and sets the baseline.
//! Every payload is released exactly once: after processing, after a drop, or at
//! `stop` if it was still queued.
//!
//! # Module Structure
//!
//! - `frame`: frame records, the handler-facing view and the `FrameHandler` trait
//! - `sync`: counting semaphore used as the handoff signal
//! - `queue`: the mutex-guarded FIFO with blocking dequeue
//! - `policy`: the admission/drop decision
//! - `worker`: the consumer thread's state machine
//! - `controller`: `VFrameQueue`, start/stop and configuration
//! - `stats`: counters shared between threads
//! - `config`: queue settings and the demo's file/env configuration
//! - `source`: synthetic producer for demos and tests

pub mod config;
pub mod controller;
pub mod frame;
pub mod policy;
pub mod queue;
pub mod source;
pub mod stats;
pub mod sync;
mod worker;

pub use config::{DemoConfig, QueueConfig, SourceSettings};
pub use controller::{FrameProducer, VFrameQueue};
pub use frame::{FrameHandler, FrameView, QueuedFrame};
pub use policy::{AdmissionPolicy, Candidate, Decision, DropReason, DEFAULT_MAX_DEPTH};
pub use queue::{Dequeued, FrameQueue};
pub use source::{SourceStats, SyntheticFrame, SyntheticSource};
pub use stats::{QueueStats, StatsSnapshot};
pub use sync::Semaphore;
