use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::policy::DEFAULT_MAX_DEPTH;

const DEFAULT_FRAME_TIME_US: u64 = 0;
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_SOURCE_JITTER_MS: u64 = 8;
const DEFAULT_REORDER_EVERY: u64 = 45;
const DEFAULT_FORCE_EVERY: u64 = 60;
const DEFAULT_PAYLOAD_BYTES: usize = 16 * 1024;
const DEFAULT_DECODE_MS: u64 = 20;

/// Settings the worker reads at `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Backlog threshold for the admission policy.
    pub max_depth: usize,
    /// Nominal frame interval. Stored, never consulted by the policy.
    pub frame_time_us: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            frame_time_us: DEFAULT_FRAME_TIME_US,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct DemoConfigFile {
    queue: Option<QueueConfigFile>,
    source: Option<SourceConfigFile>,
    handler: Option<HandlerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct QueueConfigFile {
    max_depth: Option<usize>,
    frame_time_us: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    fps: Option<u32>,
    jitter_ms: Option<u64>,
    reorder_every: Option<u64>,
    force_every: Option<u64>,
    payload_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct HandlerConfigFile {
    decode_ms: Option<u64>,
}

/// Full configuration for the `vframe_demo` binary.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub queue: QueueConfig,
    pub source: SourceSettings,
    pub decode_time: Duration,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub fps: u32,
    pub jitter: Duration,
    /// Every Nth frame arrives late with an older timestamp (0 disables).
    pub reorder_every: u64,
    /// Every Nth frame is marked no-drop (0 disables).
    pub force_every: u64,
    pub payload_bytes: usize,
}

impl DemoConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VFRAME_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (if any), then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DemoConfigFile) -> Self {
        let queue = QueueConfig {
            max_depth: file
                .queue
                .as_ref()
                .and_then(|queue| queue.max_depth)
                .unwrap_or(DEFAULT_MAX_DEPTH),
            frame_time_us: file
                .queue
                .as_ref()
                .and_then(|queue| queue.frame_time_us)
                .unwrap_or(DEFAULT_FRAME_TIME_US),
        };
        let source = file.source.unwrap_or_default();
        let source = SourceSettings {
            fps: source.fps.unwrap_or(DEFAULT_SOURCE_FPS),
            jitter: Duration::from_millis(source.jitter_ms.unwrap_or(DEFAULT_SOURCE_JITTER_MS)),
            reorder_every: source.reorder_every.unwrap_or(DEFAULT_REORDER_EVERY),
            force_every: source.force_every.unwrap_or(DEFAULT_FORCE_EVERY),
            payload_bytes: source.payload_bytes.unwrap_or(DEFAULT_PAYLOAD_BYTES),
        };
        let decode_time = Duration::from_millis(
            file.handler
                .and_then(|handler| handler.decode_ms)
                .unwrap_or(DEFAULT_DECODE_MS),
        );
        Self {
            queue,
            source,
            decode_time,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(depth) = env_number::<usize>("VFRAME_MAX_DEPTH")? {
            self.queue.max_depth = depth;
        }
        if let Some(frame_time) = env_number::<u64>("VFRAME_FRAME_TIME_US")? {
            self.queue.frame_time_us = frame_time;
        }
        if let Some(fps) = env_number::<u32>("VFRAME_FPS")? {
            self.source.fps = fps;
        }
        if let Some(decode_ms) = env_number::<u64>("VFRAME_DECODE_MS")? {
            self.decode_time = Duration::from_millis(decode_ms);
        }
        Ok(())
    }

    /// Reject settings the queue or the source cannot run with. Call again after
    /// applying overrides from other layers.
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_depth == 0 {
            return Err(anyhow!("queue max_depth must be greater than zero"));
        }
        if self.source.fps == 0 {
            return Err(anyhow!("source fps must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DemoConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a non-negative integer", key)),
        _ => Ok(None),
    }
}
