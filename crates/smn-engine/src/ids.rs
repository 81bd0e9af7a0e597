//! # smn-engine::ids
//!
//! Generator for the monotonic counters the coordinator needs: event-queue
//! insertion sequence numbers (tie-breaking within the heap) and the stable
//! `TiebreakRank` assigned to every (node, block) pair at registry-freeze
//! time, in global registration order (spec.md §4.4).

use smn_types::id::{EventId, TiebreakRank};

/// Generates unique, monotonic ids used by the coordinator's bookkeeping.
pub struct IdGen {
    event_id: EventId,
    insertion_seq: u64,
    tiebreak_rank: TiebreakRank,
}

impl IdGen {
    pub fn new() -> Self {
        Self {
            event_id: 0,
            insertion_seq: 0,
            tiebreak_rank: 0,
        }
    }

    pub fn next_event_id(&mut self) -> EventId {
        let id = self.event_id;
        self.event_id = self.event_id.checked_add(1).expect("EventId overflow");
        id
    }

    pub fn next_insertion_seq(&mut self) -> u64 {
        let id = self.insertion_seq;
        self.insertion_seq = self
            .insertion_seq
            .checked_add(1)
            .expect("insertion_seq overflow");
        id
    }

    /// Assigns the next global registration-order rank. Called exactly once
    /// per declared block, in the order `NodeRegistry::from_config` walks
    /// nodes and their block catalogs.
    pub fn next_tiebreak_rank(&mut self) -> TiebreakRank {
        let id = self.tiebreak_rank;
        self.tiebreak_rank = self
            .tiebreak_rank
            .checked_add(1)
            .expect("tiebreak_rank overflow");
        id
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}
