//! Synthetic frame source.
//!
//! `SyntheticSource` stands in for a camera feed when exercising the queue:
//! - frames carry capture timestamps spaced at the configured fps,
//! - arrival times wobble by a random jitter,
//! - every `reorder_every`th frame arrives late, stamped two intervals in the past,
//! - every `force_every`th frame is marked no-drop (keyframe analogue).
//!
//! Payload bytes are a cheap pattern; only their length and variation matter.

use rand::Rng;
use std::time::Duration;

use crate::config::SourceSettings;

/// One generated frame, ready for `enqueue`.
#[derive(Clone, Debug)]
pub struct SyntheticFrame {
    pub payload: Vec<u8>,
    pub timestamp_us: u64,
    pub no_drop: bool,
}

/// Statistics for a synthetic source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_generated: u64,
    pub late_frames: u64,
    pub forced_frames: u64,
}

pub struct SyntheticSource {
    settings: SourceSettings,
    frame_count: u64,
    stats: SourceStats,
}

impl SyntheticSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            frame_count: 0,
            stats: SourceStats::default(),
        }
    }

    /// Nominal spacing between capture timestamps.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(self.interval_us())
    }

    pub fn next_frame(&mut self) -> SyntheticFrame {
        self.frame_count += 1;

        let interval_us = self.interval_us();
        let mut timestamp_us = self.frame_count * interval_us;

        let late = is_nth(self.frame_count, self.settings.reorder_every);
        if late {
            timestamp_us = timestamp_us.saturating_sub(2 * interval_us);
            self.stats.late_frames += 1;
        }

        let no_drop = is_nth(self.frame_count, self.settings.force_every);
        if no_drop {
            self.stats.forced_frames += 1;
        }

        self.stats.frames_generated += 1;
        SyntheticFrame {
            payload: self.generate_payload(),
            timestamp_us,
            no_drop,
        }
    }

    /// How long the producer should wait before delivering the next frame:
    /// the frame interval plus or minus up to `jitter`.
    pub fn next_arrival(&self) -> Duration {
        let interval = self.frame_interval();
        let jitter = self.settings.jitter;
        if jitter.is_zero() {
            return interval;
        }
        let jitter_us = u64::try_from(jitter.as_micros()).unwrap_or(u64::MAX);
        let offset = rand::thread_rng().gen_range(0..=jitter_us.saturating_mul(2));
        interval
            .saturating_add(Duration::from_micros(offset))
            .saturating_sub(jitter)
    }

    pub fn stats(&self) -> SourceStats {
        self.stats.clone()
    }

    fn interval_us(&self) -> u64 {
        1_000_000 / u64::from(self.settings.fps.max(1))
    }

    fn generate_payload(&self) -> Vec<u8> {
        let mut payload = vec![0u8; self.settings.payload_bytes];
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte = ((i as u64 + self.frame_count) % 256) as u8;
        }
        payload
    }
}

fn is_nth(count: u64, every: u64) -> bool {
    every != 0 && count % every == 0
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(reorder_every: u64, force_every: u64) -> SourceSettings {
        SourceSettings {
            fps: 25,
            jitter: Duration::from_millis(5),
            reorder_every,
            force_every,
            payload_bytes: 64,
        }
    }

    #[test]
    fn timestamps_follow_the_frame_rate() {
        let mut source = SyntheticSource::new(settings(0, 0));
        let stamps: Vec<u64> = (0..3).map(|_| source.next_frame().timestamp_us).collect();
        assert_eq!(stamps, vec![40_000, 80_000, 120_000]);
    }

    #[test]
    fn late_frames_go_back_in_time() {
        let mut source = SyntheticSource::new(settings(3, 0));
        let stamps: Vec<u64> = (0..3).map(|_| source.next_frame().timestamp_us).collect();

        assert!(stamps[2] < stamps[1], "third frame must be late: {:?}", stamps);
        assert_eq!(source.stats().late_frames, 1);
    }

    #[test]
    fn forced_frames_are_marked() {
        let mut source = SyntheticSource::new(settings(0, 2));
        let flags: Vec<bool> = (0..4).map(|_| source.next_frame().no_drop).collect();
        assert_eq!(flags, vec![false, true, false, true]);
        assert_eq!(source.stats().forced_frames, 2);
    }

    #[test]
    fn payloads_vary_between_frames() {
        let mut source = SyntheticSource::new(settings(0, 0));
        let a = source.next_frame();
        let b = source.next_frame();
        assert_eq!(a.payload.len(), 64);
        assert_ne!(a.payload, b.payload);
    }

    #[test]
    fn huge_jitter_saturates_instead_of_overflowing() {
        let mut huge = settings(0, 0);
        huge.jitter = Duration::from_micros(u64::MAX);
        let source = SyntheticSource::new(huge);
        for _ in 0..10 {
            // Doubled jitter saturates at u64::MAX micros, so the delay never
            // exceeds one frame interval here.
            assert!(source.next_arrival() <= source.frame_interval());
        }
    }

    #[test]
    fn arrival_stays_within_jitter() {
        let source = SyntheticSource::new(settings(0, 0));
        for _ in 0..50 {
            let arrival = source.next_arrival();
            assert!(arrival >= Duration::from_millis(35), "{:?}", arrival);
            assert!(arrival <= Duration::from_millis(45), "{:?}", arrival);
        }
    }
}
