//! # smn-engine::registry
//!
//! The node registry (spec.md §4.3): a stable `NodeId` ↔ name table plus
//! each node's declared block catalog, ports, dependency edges, and
//! liveness state. Built once from a `SystemConfig`, then frozen for the
//! duration of the run — no global mutable registration state, per the
//! DESIGN NOTES' "entire `SystemConfig` is one immutable value" guidance.

use indexmap::IndexMap;
use smn_types::{
    config::{NodeSpec, PortDirection, SystemConfig},
    errors::RegistrationError,
    id::{BlockLocalId, NodeId, TiebreakRank},
    time::SimTime,
};
use std::collections::HashSet;

use crate::ids::IdGen;

/// A node's lifecycle state (spec.md §3, invariant I4). Transitions are
/// monotone along the normal path; `Errored` and `TimedOut` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Unregistered,
    Registered,
    Ready,
    Running,
    Stopped,
    Errored,
    TimedOut,
}

impl Liveness {
    /// Whether `next` is a legal transition from `self` under I4.
    pub fn can_transition_to(self, next: Liveness) -> bool {
        use Liveness::*;
        match (self, next) {
            (Errored, _) | (TimedOut, _) => false,
            (s, n) if s == n => true,
            (Unregistered, Registered)
            | (Registered, Ready)
            | (Ready, Running)
            | (Running, Stopped) => true,
            (_, Errored) | (_, TimedOut) => true,
            _ => false,
        }
    }
}

/// A schedulable unit of work inside a node (spec.md §3).
#[derive(Debug, Clone)]
pub struct BlockRuntime {
    pub local_id: BlockLocalId,
    pub period: SimTime,
    pub next_fire: Option<SimTime>,
    pub feedthrough_inputs: HashSet<String>,
    pub triggering_inputs: HashSet<String>,
    pub output_ports: HashSet<String>,
    pub internal_deps: HashSet<BlockLocalId>,
    /// Global registration-order rank, assigned once at registry-build time.
    /// Used as the event queue's and wave DAG's deterministic tie-break key.
    pub tiebreak_rank: TiebreakRank,
}

/// A node's declared ports (spec.md §3); the SMN never touches payloads,
/// only names and directions, to resolve feedthrough/trigger connections.
#[derive(Debug, Clone)]
pub struct PortRuntime {
    pub name: String,
    pub direction: PortDirection,
}

/// A registered node and its full declared state (spec.md §3).
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub blocks: Vec<BlockRuntime>,
    pub ports: Vec<PortRuntime>,
    pub needs_state_update: bool,
    pub liveness: Liveness,
}

impl NodeRecord {
    pub fn block(&self, local_id: BlockLocalId) -> Option<&BlockRuntime> {
        self.blocks.iter().find(|b| b.local_id == local_id)
    }

    pub fn block_mut(&mut self, local_id: BlockLocalId) -> Option<&mut BlockRuntime> {
        self.blocks.iter_mut().find(|b| b.local_id == local_id)
    }

    fn block_id_set(&self) -> HashSet<BlockLocalId> {
        self.blocks.iter().map(|b| b.local_id).collect()
    }
}

/// The id-indexed node table plus a name→id index (spec.md §4.3).
pub struct NodeRegistry {
    nodes: Vec<NodeRecord>,
    by_name: IndexMap<String, NodeId>,
    frozen: bool,
}

impl NodeRegistry {
    /// Builds a frozen-at-setup registry from a validated `SystemConfig`.
    /// Assigns contiguous `NodeId`s in declaration order and a global
    /// `TiebreakRank` to every block, in the same order, via `id_gen`.
    pub fn from_config(config: &SystemConfig, id_gen: &mut IdGen) -> Self {
        let mut nodes = Vec::with_capacity(config.nodes.len());
        let mut by_name = IndexMap::with_capacity(config.nodes.len());

        for (idx, spec) in config.nodes.iter().enumerate() {
            let id = idx as NodeId;
            by_name.insert(spec.name.clone(), id);
            nodes.push(Self::build_record(id, spec, id_gen));
        }

        Self {
            nodes,
            by_name,
            frozen: false,
        }
    }

    fn build_record(id: NodeId, spec: &NodeSpec, id_gen: &mut IdGen) -> NodeRecord {
        let blocks = spec
            .blocks
            .iter()
            .map(|b| BlockRuntime {
                local_id: b.local_id,
                period: b.period,
                next_fire: None,
                feedthrough_inputs: b.feedthrough_inputs.iter().cloned().collect(),
                triggering_inputs: b.triggering_inputs.iter().cloned().collect(),
                output_ports: b.output_ports.iter().cloned().collect(),
                internal_deps: b.internal_deps.iter().cloned().collect(),
                tiebreak_rank: id_gen.next_tiebreak_rank(),
            })
            .collect();

        let ports = spec
            .ports
            .iter()
            .map(|p| PortRuntime {
                name: p.name.clone(),
                direction: p.direction,
            })
            .collect();

        NodeRecord {
            id,
            name: spec.name.clone(),
            blocks,
            ports,
            needs_state_update: spec.needs_state_update,
            liveness: Liveness::Unregistered,
        }
    }

    /// Closes setup: no further registration is accepted afterward.
    pub fn close_setup(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(id as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(id as usize)
    }

    pub fn id_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Registers (or idempotently re-registers) a node by name, checking
    /// the declared block catalog against the frozen configuration
    /// (spec.md §4.3). `close_setup` must not have been called yet.
    pub fn register(
        &mut self,
        name: &str,
        declared_blocks: &[BlockLocalId],
    ) -> Result<NodeId, RegistrationError> {
        if self.frozen {
            return Err(RegistrationError::RegistryFrozen);
        }
        let id = self
            .id_by_name(name)
            .ok_or_else(|| RegistrationError::UnknownName(name.to_string()))?;
        let declared: HashSet<BlockLocalId> = declared_blocks.iter().copied().collect();
        let record = &mut self.nodes[id as usize];
        let expected = record.block_id_set();

        match record.liveness {
            Liveness::Unregistered => {
                if declared != expected {
                    return Err(RegistrationError::RegistrationConflict {
                        name: name.to_string(),
                    });
                }
                record.liveness = Liveness::Registered;
                Ok(id)
            }
            _ => {
                if declared != expected {
                    return Err(RegistrationError::RegistrationConflict {
                        name: name.to_string(),
                    });
                }
                Ok(id)
            }
        }
    }

    pub fn set_liveness(&mut self, id: NodeId, next: Liveness) -> bool {
        if let Some(record) = self.get_mut(id) {
            if record.liveness.can_transition_to(next) {
                record.liveness = next;
                return true;
            }
        }
        false
    }

    pub fn all_registered(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| !matches!(n.liveness, Liveness::Unregistered))
    }

    pub fn active_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter_map(|n| {
            (!matches!(n.liveness, Liveness::Errored | Liveness::TimedOut | Liveness::Stopped))
                .then_some(n.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smn_types::config::{BlockSpec, Deadlines, PortSpec};
    use std::time::Duration;

    fn node(name: &str, period: SimTime) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            needs_state_update: true,
            ports: vec![PortSpec {
                name: "y".into(),
                direction: PortDirection::Output,
            }],
            blocks: vec![BlockSpec {
                local_id: 0,
                period,
                feedthrough_inputs: vec![],
                triggering_inputs: vec![],
                output_ports: vec!["y".into()],
                internal_deps: vec![],
            }],
        }
    }

    fn config(nodes: Vec<NodeSpec>) -> SystemConfig {
        SystemConfig {
            name: "t".into(),
            nodes,
            connections: vec![],
            time_unit: smn_types::time::TimeUnit::Microseconds,
            final_time: 5000,
            deadlines: Deadlines {
                init: Duration::from_millis(500),
                y: Duration::from_millis(200),
                x: Duration::from_millis(200),
                term: Duration::from_millis(200),
            },
        }
    }

    #[test]
    fn assigns_contiguous_ids_and_tiebreak_ranks() {
        let cfg = config(vec![node("a", 1000), node("b", 2000)]);
        let mut id_gen = IdGen::new();
        let reg = NodeRegistry::from_config(&cfg, &mut id_gen);
        assert_eq!(reg.id_by_name("a"), Some(0));
        assert_eq!(reg.id_by_name("b"), Some(1));
        assert_eq!(reg.get(0).unwrap().blocks[0].tiebreak_rank, 0);
        assert_eq!(reg.get(1).unwrap().blocks[0].tiebreak_rank, 1);
    }

    #[test]
    fn registration_is_idempotent_for_matching_signature() {
        let cfg = config(vec![node("a", 1000)]);
        let mut id_gen = IdGen::new();
        let mut reg = NodeRegistry::from_config(&cfg, &mut id_gen);
        let id1 = reg.register("a", &[0]).unwrap();
        let id2 = reg.register("a", &[0]).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(reg.get(id1).unwrap().liveness, Liveness::Registered);
    }

    #[test]
    fn registration_conflict_on_mismatched_signature() {
        let cfg = config(vec![node("a", 1000)]);
        let mut id_gen = IdGen::new();
        let mut reg = NodeRegistry::from_config(&cfg, &mut id_gen);
        reg.register("a", &[0]).unwrap();
        let err = reg.register("a", &[0, 1]).unwrap_err();
        assert!(matches!(err, RegistrationError::RegistrationConflict { .. }));
    }

    #[test]
    fn liveness_errored_is_absorbing() {
        let cfg = config(vec![node("a", 1000)]);
        let mut id_gen = IdGen::new();
        let mut reg = NodeRegistry::from_config(&cfg, &mut id_gen);
        reg.set_liveness(0, Liveness::Errored);
        assert!(!reg.set_liveness(0, Liveness::Running));
        assert_eq!(reg.get(0).unwrap().liveness, Liveness::Errored);
    }
}
