//! Frame admission policy.
//!
//! Decides, for each dequeued frame after the first, whether the handler sees it.
//! Checks run in priority order:
//! 1. forced (`no_drop`) frames are always processed,
//! 2. frames older than the previous frame are dropped,
//! 3. frames with more than `max_depth` frames queued behind them are dropped,
//! 4. everything else is processed.
//!
//! The policy is pure: it neither logs nor mutates. The worker reports drops.

/// Default backlog threshold: shed a frame when more than this many wait behind it.
pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Timestamp went backwards relative to the previous frame.
    Stale { timestamp_us: u64, last_us: u64 },
    /// Too many frames queued behind this one.
    Backlog { depth: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Process,
    Drop(DropReason),
}

impl Decision {
    pub fn is_process(self) -> bool {
        matches!(self, Decision::Process)
    }
}

/// Inputs for one admission decision.
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub timestamp_us: u64,
    pub no_drop: bool,
    /// Timestamp of the previous dequeued frame.
    pub last_us: u64,
    /// Queue depth measured right after this frame was popped.
    pub depth: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionPolicy {
    max_depth: usize,
}

impl AdmissionPolicy {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn decide(&self, candidate: Candidate) -> Decision {
        if candidate.no_drop {
            Decision::Process
        } else if candidate.timestamp_us < candidate.last_us {
            Decision::Drop(DropReason::Stale {
                timestamp_us: candidate.timestamp_us,
                last_us: candidate.last_us,
            })
        } else if candidate.depth > self.max_depth {
            Decision::Drop(DropReason::Backlog {
                depth: candidate.depth,
            })
        } else {
            Decision::Process
        }
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
