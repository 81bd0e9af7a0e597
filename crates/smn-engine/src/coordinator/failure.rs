//! # smn-engine::coordinator::failure
//!
//! Per-phase wall-clock deadlines and the resend/escalation policy
//! (spec.md §4.6). Tracks, per in-flight phase, a deadline computed from
//! the configured `Duration` and a retry counter per node — structurally
//! similar to the teacher's per-node fault-rate tracking, but driven by
//! real wall-clock deadlines rather than RNG trials.

use fxhash::FxHashMap;
use smn_types::id::NodeId;
use std::time::{Duration, Instant};

/// A wall-clock deadline computed from a configured phase duration.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn from_now(d: Duration) -> Self {
        Self {
            at: Instant::now() + d,
        }
    }

    /// Time left before the deadline, zero if already passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Tracks how many times each node has been resent a message within the
/// current phase, implementing the "resend once, then escalate" policy
/// (spec.md §4.6's table).
#[derive(Default)]
pub struct RetryTracker {
    resends: FxHashMap<NodeId, u32>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a resend for `node`, returning the new resend count.
    pub fn record_resend(&mut self, node: NodeId) -> u32 {
        let count = self.resends.entry(node).or_insert(0);
        *count += 1;
        *count
    }

    pub fn resend_count(&self, node: NodeId) -> u32 {
        self.resends.get(&node).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_expires_after_duration_elapses() {
        let d = Deadline::from_now(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(d.is_expired());
    }

    #[test]
    fn retry_tracker_counts_per_node_resends() {
        let mut tracker = RetryTracker::new();
        assert_eq!(tracker.record_resend(0), 1);
        assert_eq!(tracker.record_resend(0), 2);
        assert_eq!(tracker.resend_count(1), 0);
    }
}
