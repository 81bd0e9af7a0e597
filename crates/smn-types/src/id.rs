//! # smn-types::id
//!
//! Defines the core identifier types used throughout the coordinator.
//! Using distinct types for different kinds of IDs helps prevent bugs where,
//! for example, a `NodeId` might be accidentally used as a `BlockLocalId`.

/// A unique, stable identifier for a node, assigned during setup and held
/// for the lifetime of the run. Invariant: nodes registered during setup
/// are assigned contiguous ids from 0 to N-1, in registration order.
pub type NodeId = u32;

/// A block's identifier within its owning node. Restricted to `0..64`
/// because the wire protocol addresses fired blocks with a `u64` bitmask
/// (spec.md §6); a node declaring a 65th block is a setup-time `ConfigError`.
pub type BlockLocalId = u16;

/// The maximum number of blocks a single node may declare, fixed by the
/// width of the wire `mask` field.
pub const MAX_BLOCKS_PER_NODE: usize = 64;

/// A unique identifier for an entry in the coordinator's event queue.
pub type EventId = u64;

/// A stable rank assigned to every (node, block) pair in global
/// registration order. Used exclusively as the event queue's tie-break
/// key and the wave DAG's deterministic sort key (spec.md §4.4, §4.5).
pub type TiebreakRank = u64;
