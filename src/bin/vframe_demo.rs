//! vframe_demo - drive a synthetic camera feed through the frame queue
//!
//! This binary:
//! 1. Loads queue/source/handler settings (file, env, then CLI flags)
//! 2. Starts the worker with a handler that simulates decode cost
//! 3. Feeds jittered, occasionally late frames from a producer thread
//! 4. Stops on timeout or Ctrl-C and prints what was processed and dropped

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use vframe_queue::{DemoConfig, FrameHandler, FrameView, SyntheticSource, VFrameQueue};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// How long to feed frames, in seconds.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Source frame rate (overrides config).
    #[arg(long)]
    fps: Option<u32>,
    /// Simulated per-frame decode time in milliseconds (overrides config).
    #[arg(long)]
    decode_ms: Option<u64>,
    /// Arrival jitter in milliseconds (overrides config).
    #[arg(long)]
    jitter_ms: Option<u64>,
    /// Backlog threshold for shedding (overrides config).
    #[arg(long)]
    max_depth: Option<usize>,
    /// TOML config file.
    #[arg(long, env = "VFRAME_CONFIG")]
    config: Option<PathBuf>,
}

/// Stand-in for a decoder: hashes each payload into a chain and burns `decode_time`.
struct DecodeSimulator {
    decode_time: Duration,
    chain: Arc<Mutex<[u8; 32]>>,
}

impl FrameHandler for DecodeSimulator {
    fn handle_frame(&mut self, frame: FrameView<'_>) {
        let digest: [u8; 32] = Sha256::digest(frame.payload()).into();
        {
            let mut chain = self.chain.lock().unwrap_or_else(PoisonError::into_inner);
            let mut hasher = Sha256::new();
            hasher.update(*chain);
            hasher.update(digest);
            *chain = hasher.finalize().into();
        }
        log::debug!(
            "decoded frame ts={} len={} digest={}",
            frame.timestamp_us(),
            frame.len(),
            hex::encode(&digest[..8])
        );
        std::thread::sleep(self.decode_time);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = DemoConfig::load_from(args.config.as_deref())?;
    if let Some(fps) = args.fps {
        cfg.source.fps = fps;
    }
    if let Some(decode_ms) = args.decode_ms {
        cfg.decode_time = Duration::from_millis(decode_ms);
    }
    if let Some(jitter_ms) = args.jitter_ms {
        cfg.source.jitter = Duration::from_millis(jitter_ms);
    }
    if let Some(max_depth) = args.max_depth {
        cfg.queue.max_depth = max_depth;
    }
    cfg.validate()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }

    let chain = Arc::new(Mutex::new([0u8; 32]));
    let mut queue = VFrameQueue::new(cfg.queue.clone());
    queue.set_frame_time(1_000_000 / u64::from(cfg.source.fps))?;
    queue.set_frame_callback(DecodeSimulator {
        decode_time: cfg.decode_time,
        chain: Arc::clone(&chain),
    })?;

    log::info!(
        "vframe_demo: {} fps for {}s, decode {:?}, jitter {:?}, max depth {}",
        cfg.source.fps,
        args.seconds,
        cfg.decode_time,
        cfg.source.jitter,
        cfg.queue.max_depth
    );

    queue.start()?;

    let producer = queue.producer();
    let source_settings = cfg.source.clone();
    let deadline = Duration::from_secs(args.seconds);
    let feeder_stop = Arc::clone(&stop);
    let feeder = std::thread::Builder::new()
        .name("vframe-producer".to_string())
        .spawn(move || {
            let mut source = SyntheticSource::new(source_settings);
            let started = Instant::now();
            while started.elapsed() < deadline && !feeder_stop.load(Ordering::SeqCst) {
                let frame = source.next_frame();
                producer.enqueue(&frame.payload, frame.timestamp_us, frame.no_drop);
                std::thread::sleep(source.next_arrival());
            }
            source.stats()
        })
        .context("spawn producer thread")?;

    let source_stats = feeder
        .join()
        .map_err(|_| anyhow!("producer thread panicked"))?;
    queue.stop()?;

    let stats = queue.stats();
    let chain = *chain.lock().unwrap_or_else(PoisonError::into_inner);
    log::info!(
        "source: generated={} late={} forced={}",
        source_stats.frames_generated,
        source_stats.late_frames,
        source_stats.forced_frames
    );
    log::info!(
        "queue: enqueued={} processed={} dropped_stale={} dropped_backlog={} abandoned={} released={}",
        stats.enqueued,
        stats.processed,
        stats.dropped_stale,
        stats.dropped_backlog,
        stats.abandoned,
        stats.released
    );
    log::info!(
        "last handler time {:?}, decode chain {}",
        stats.last_processing,
        hex::encode(chain)
    );

    Ok(())
}
