//! # smn-engine::coordinator::tick
//!
//! The current tick's workspace (spec.md §4.5): the fired set `F`, the wave
//! partition, and which wave is in flight. Owned by the `Tick` state-machine
//! variant per the DESIGN NOTES ("the current-tick workspace is a struct
//! owned by the `Tick` variant"). Also the small wire helpers (bitmask
//! packing, frame constructors) the coordinator's tick protocol needs.

use crate::graph::BlockKey;
use smn_proto::{Frame, MsgKind, Payload};
use smn_types::{
    id::{BlockLocalId, NodeId},
    time::SimTime,
};

/// The coordinator's progress through one tick's UPDATE_Y/UPDATE_X barrier.
pub struct TickWorkspace {
    pub t: SimTime,
    pub fired: Vec<BlockKey>,
    pub waves: Vec<Vec<BlockKey>>,
    pub wave_index: usize,
}

impl TickWorkspace {
    pub fn new(t: SimTime, fired: Vec<BlockKey>, waves: Vec<Vec<BlockKey>>) -> Self {
        Self {
            t,
            fired,
            waves,
            wave_index: 0,
        }
    }
}

/// Packs a set of local block ids into the wire `mask` bitfield
/// (spec.md §6: `mask (uint64, little-endian bitfield over local block ids)`).
pub fn ids_to_mask(ids: impl IntoIterator<Item = BlockLocalId>) -> u64 {
    ids.into_iter().fold(0u64, |m, id| m | (1u64 << id))
}

/// Unpacks the wire `mask` bitfield back into local block ids.
pub fn mask_to_ids(mask: u64) -> Vec<BlockLocalId> {
    (0..64)
        .filter(|i| mask & (1u64 << i) != 0)
        .map(|i| i as BlockLocalId)
        .collect()
}

/// Groups a tick's fired set by node, producing one `(NodeId, mask)` pair
/// per node with at least one firing in `keys` (spec.md §4.5 step 4: "group
/// its fired blocks into a bitmask and send one `SIM_Y(t, mask)`").
pub fn group_by_node(keys: &[BlockKey]) -> Vec<(NodeId, u64)> {
    let mut grouped: Vec<(NodeId, u64)> = Vec::new();
    for (node_id, local_id) in keys {
        match grouped.iter_mut().find(|(n, _)| n == node_id) {
            Some((_, mask)) => *mask |= 1u64 << local_id,
            None => grouped.push((*node_id, 1u64 << local_id)),
        }
    }
    grouped.sort_by_key(|(n, _)| *n);
    grouped
}

/// Converts virtual time to the wire's signed 64-bit `sim_time` field. A
/// `final_time` large enough to overflow `i64` is rejected by
/// `SystemConfig` validation long before a tick reaches it, so this never
/// saturates in practice; it saturates rather than panics as a last resort.
pub fn sim_time_to_wire(t: SimTime) -> i64 {
    i64::try_from(t).unwrap_or(i64::MAX)
}

pub fn y_frame(t: SimTime, node_id: NodeId, mask: u64) -> Frame {
    Frame {
        msg_type: MsgKind::Y,
        sim_time: sim_time_to_wire(t),
        node_id: node_id as i32,
        mask,
        payload: Payload::Y,
    }
}

pub fn x_frame(t: SimTime, node_id: NodeId, mask: u64) -> Frame {
    Frame {
        msg_type: MsgKind::X,
        sim_time: sim_time_to_wire(t),
        node_id: node_id as i32,
        mask,
        payload: Payload::X,
    }
}

pub fn init_frame(t: SimTime, node_id: NodeId, atom_nanos: u64, block_ids: Vec<u16>) -> Frame {
    Frame {
        msg_type: MsgKind::Init,
        sim_time: sim_time_to_wire(t),
        node_id: node_id as i32,
        mask: 0,
        payload: Payload::Init {
            atom_nanos,
            block_ids,
        },
    }
}

pub fn term_frame(t: SimTime) -> Frame {
    Frame {
        msg_type: MsgKind::Term,
        sim_time: sim_time_to_wire(t),
        node_id: -1,
        mask: 0,
        payload: Payload::Term,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_round_trips() {
        let ids = vec![0u16, 3, 5, 63];
        let mask = ids_to_mask(ids.clone());
        let mut back = mask_to_ids(mask);
        back.sort();
        assert_eq!(back, ids);
    }

    #[test]
    fn group_by_node_merges_same_node_blocks() {
        let keys = vec![(0u32, 0u16), (0, 1), (1, 0)];
        let grouped = group_by_node(&keys);
        assert_eq!(grouped, vec![(0, 0b11), (1, 0b1)]);
    }
}
