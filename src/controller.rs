//! Lifecycle of the frame queue and its worker thread.
//!
//! `VFrameQueue` owns the shared queue state, the frame handler and at most one
//! worker thread. Configuration (`set_frame_callback`, `set_frame_time`) is accepted
//! only while stopped; the handler moves onto the worker thread at `start` and comes
//! back at `stop`, so no other thread can observe it mid-loop.
//!
//! Threads involved:
//! - the producer, calling `enqueue` (directly or through a `FrameProducer`),
//! - the worker, spawned by `start` and joined by `stop`.

use anyhow::{anyhow, bail, Context, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::QueueConfig;
use crate::frame::FrameHandler;
use crate::policy::AdmissionPolicy;
use crate::stats::StatsSnapshot;
use crate::worker::{run_worker, Shared};

const WORKER_THREAD_NAME: &str = "vframe-worker";

type BoxedHandler = Box<dyn FrameHandler>;

pub struct VFrameQueue {
    shared: Arc<Shared>,
    config: QueueConfig,
    /// Present while stopped; lives on the worker thread while running.
    handler: Option<BoxedHandler>,
    worker: Option<JoinHandle<BoxedHandler>>,
}

impl VFrameQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            config,
            handler: None,
            worker: None,
        }
    }

    /// Install the frame handler. Must be called before `start`.
    pub fn set_frame_callback<H>(&mut self, handler: H) -> Result<()>
    where
        H: FrameHandler + 'static,
    {
        self.ensure_stopped("set frame callback")?;
        self.handler = Some(Box::new(handler));
        Ok(())
    }

    /// Record the nominal frame interval in microseconds.
    ///
    /// Stored for callers that want it back; the admission policy does not read it.
    pub fn set_frame_time(&mut self, time_us: u64) -> Result<()> {
        self.ensure_stopped("set frame time")?;
        self.config.frame_time_us = time_us;
        Ok(())
    }

    pub fn frame_time(&self) -> u64 {
        self.config.frame_time_us
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Copy `payload` into the queue. Never blocks on the worker.
    pub fn enqueue(&self, payload: &[u8], timestamp_us: u64, no_drop: bool) {
        self.shared.enqueue(payload, timestamp_us, no_drop);
    }

    /// Handle for a producer running on its own thread.
    ///
    /// The queue is single-producer: hand this to exactly one thread and do not
    /// call `enqueue` on the controller concurrently.
    pub fn producer(&self) -> FrameProducer {
        FrameProducer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Spawn the worker thread.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            bail!("frame worker is already running");
        }
        let mut handler = self
            .handler
            .take()
            .ok_or_else(|| anyhow!("frame callback must be set before start"))?;

        let policy = AdmissionPolicy::new(self.config.max_depth);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                run_worker(&shared, policy, &mut *handler);
                handler
            });

        match spawned {
            Ok(join) => {
                self.worker = Some(join);
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(err).context("spawn frame worker thread")
            }
        }
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Frames still queued afterwards are released unprocessed and counted as
    /// abandoned. Calling `stop` when not running only performs that cleanup.
    pub fn stop(&mut self) -> Result<()> {
        self.shared.running.store(false, Ordering::SeqCst);
        // Unpark a worker blocked on an empty queue.
        self.shared.queue.wake();

        let joined = match self.worker.take() {
            Some(join) => match join.join() {
                Ok(handler) => {
                    self.handler = Some(handler);
                    Ok(())
                }
                Err(_) => Err(anyhow!("frame worker thread panicked")),
            },
            None => Ok(()),
        };

        self.release_abandoned();
        joined
    }

    /// True while a worker is attached and has not stopped on its own. A worker
    /// whose handler panicked reports false here until `stop` reaps it.
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.shared.is_running()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    fn release_abandoned(&self) {
        let leftover = self.shared.queue.drain();
        if leftover.is_empty() {
            return;
        }
        let count = leftover.len() as u64;
        for frame in leftover {
            self.shared.release(frame);
        }
        self.shared.stats.record_abandoned(count);
        log::info!("released {} queued frames abandoned at shutdown", count);
    }

    fn ensure_stopped(&self, action: &str) -> Result<()> {
        if self.worker.is_some() {
            bail!("cannot {} while the frame worker is running", action);
        }
        Ok(())
    }
}

impl Default for VFrameQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl Drop for VFrameQueue {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                log::error!("frame worker shutdown failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for VFrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VFrameQueue")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("has_handler", &self.handler.is_some())
            .field("queued", &self.queue_len())
            .finish()
    }
}

/// Producer-side handle to a `VFrameQueue`.
///
/// Deliberately not `Clone`: one producer per queue.
#[derive(Debug)]
pub struct FrameProducer {
    shared: Arc<Shared>,
}

impl FrameProducer {
    /// Copy `payload` into the queue. Never blocks on the worker.
    pub fn enqueue(&self, payload: &[u8], timestamp_us: u64, no_drop: bool) {
        self.shared.enqueue(payload, timestamp_us, no_drop);
    }

    /// True while the worker is consuming.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}
