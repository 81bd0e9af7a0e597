//! # smn-engine::queue
//!
//! The event queue (spec.md §4.4): a min-heap of future block firings keyed
//! by `(fire_time, tiebreak_rank)`. Entries refer to `(node_id,
//! local_block_id, reason)`; `remove_node` drops every entry for a node on
//! failure. Follows the teacher's `Queued<T>` + `BinaryHeap` tie-break
//! pattern, specialized to the coordinator's firing type.

use smn_types::{
    id::{BlockLocalId, NodeId, TiebreakRank},
    time::SimTime,
};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Why a block is being fired at its scheduled time (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireReason {
    Periodic,
    Triggered,
    Irregular,
}

/// A single scheduled firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firing {
    pub node_id: NodeId,
    pub local_id: BlockLocalId,
    pub reason: FireReason,
}

struct Entry {
    fire_time: SimTime,
    tiebreak_rank: TiebreakRank,
    insertion_seq: u64,
    firing: Firing,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time == other.fire_time
            && self.tiebreak_rank == other.tiebreak_rank
            && self.insertion_seq == other.insertion_seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// `BinaryHeap` is a max-heap; reversing every field turns it into a
    /// min-heap ordered by `(fire_time, tiebreak_rank)` as spec.md §4.4
    /// requires, with insertion order as a final deterministic tie-break
    /// for two pushes of the same (time, rank) — which should not happen
    /// for distinct blocks, since rank is unique per block, but can happen
    /// when the same block is rescheduled (e.g. an irregular event at a
    /// time that coincides with its own periodic slot).
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_time
            .cmp(&self.fire_time)
            .then_with(|| other.tiebreak_rank.cmp(&self.tiebreak_rank))
            .then_with(|| other.insertion_seq.cmp(&self.insertion_seq))
    }
}

/// The coordinator's priority queue of future block firings.
pub struct EventQueue {
    heap: BinaryHeap<Entry>,
    next_insertion_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_insertion_seq: 0,
        }
    }

    pub fn push(&mut self, fire_time: SimTime, tiebreak_rank: TiebreakRank, firing: Firing) {
        let seq = self.next_insertion_seq;
        self.next_insertion_seq += 1;
        self.heap.push(Entry {
            fire_time,
            tiebreak_rank,
            insertion_seq: seq,
            firing,
        });
    }

    pub fn peek_min_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.fire_time)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Pops every entry whose `fire_time` equals the current minimum,
    /// returning them in ascending `tiebreak_rank` order (spec.md §4.5 step
    /// 1). Returns `None` if the queue is empty.
    pub fn pop_ready(&mut self) -> Option<(SimTime, Vec<Firing>)> {
        let min_time = self.peek_min_time()?;
        let mut ready = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.fire_time != min_time {
                break;
            }
            let entry = self.heap.pop().unwrap();
            ready.push(entry.firing);
        }
        Some((min_time, ready))
    }

    /// Removes every queued entry for `node_id`, used on node failure
    /// cascades (spec.md §4.4, §4.6). `BinaryHeap` has no efficient
    /// arbitrary-removal operation, so this rebuilds the heap — O(n), an
    /// accepted trade-off at the block counts (hundreds, not millions)
    /// this coordinator targets.
    pub fn remove_node(&mut self, node_id: NodeId) {
        let remaining: Vec<Entry> = std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .filter(|e| e.firing.node_id != node_id)
            .collect();
        self.heap = BinaryHeap::from(remaining);
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
