//! # smn-engine::graph
//!
//! The per-tick dependency graph (spec.md §4.5 step 3) and the one-time
//! static cycle check over the full feedthrough/internal-deps projection
//! (spec.md §3 invariant I2, §4.6 "setup-phase cycle"). Uses an index-based
//! adjacency representation per the DESIGN NOTES: (node, block) pairs are
//! addressed by small integers, never by object reference.

use fxhash::{FxHashMap, FxHashSet};
use smn_types::{
    config::{ConnectionSpec, SystemConfig},
    errors::ConfigError,
    id::{BlockLocalId, NodeId},
};

use crate::registry::NodeRegistry;

/// A single (node, block) pair, the unit the update graph schedules.
pub type BlockKey = (NodeId, BlockLocalId);

/// Resolves `ConnectionSpec` endpoints (string node/port names) against the
/// frozen registry once, into an index keyed by (src node, src port) so
/// the per-tick trigger/feedthrough expansion never re-parses strings.
pub struct ConnectionIndex {
    /// (src_node, src_port) -> [(dst_node, dst_port)]
    by_source: FxHashMap<(NodeId, String), Vec<(NodeId, String)>>,
}

impl ConnectionIndex {
    pub fn build(
        registry: &NodeRegistry,
        connections: &[ConnectionSpec],
    ) -> Result<Self, ConfigError> {
        let mut by_source: FxHashMap<(NodeId, String), Vec<(NodeId, String)>> =
            FxHashMap::default();
        for conn in connections {
            let src_id = registry
                .id_by_name(&conn.src_node)
                .ok_or_else(|| ConfigError::UnknownNode(conn.src_node.clone()))?;
            let dst_id = registry
                .id_by_name(&conn.dst_node)
                .ok_or_else(|| ConfigError::UnknownNode(conn.dst_node.clone()))?;
            by_source
                .entry((src_id, conn.src_port.clone()))
                .or_default()
                .push((dst_id, conn.dst_port.clone()));
        }
        Ok(Self { by_source })
    }

    fn targets(&self, node: NodeId, port: &str) -> &[(NodeId, String)] {
        self.by_source
            .get(&(node, port.to_string()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Builds the full dependency edge set over every declared block in the
/// registry (not just a tick's fired set): internal_deps within a node, and
/// cross-node feedthrough edges derived from connections. Used both by the
/// static setup-time cycle check and, restricted to a tick's fired set, by
/// `build_wave_dag`.
fn all_edges(registry: &NodeRegistry, conns: &ConnectionIndex) -> Vec<(BlockKey, BlockKey)> {
    let mut edges = Vec::new();
    for node_id in registry.ids() {
        let node = registry.get(node_id).expect("node id from ids()");
        for block in &node.blocks {
            for dep in &block.internal_deps {
                edges.push(((node_id, *dep), (node_id, block.local_id)));
            }
        }
        for block in &node.blocks {
            for out_port in &block.output_ports {
                for (dst_node, dst_port) in conns.targets(node_id, out_port) {
                    let dst_record = match registry.get(*dst_node) {
                        Some(r) => r,
                        None => continue,
                    };
                    for dst_block in &dst_record.blocks {
                        if dst_block.feedthrough_inputs.contains(dst_port) {
                            edges.push(((node_id, block.local_id), (*dst_node, dst_block.local_id)));
                        }
                    }
                }
            }
        }
    }
    edges
}

/// Performs the setup-time cycle check required by invariant I2: the full
/// declared dependency projection (every block, not just a tick's fired
/// set) must be acyclic. Returns `ConfigError::DependencyCycle` naming one
/// offending node for diagnostics if a cycle is found.
pub fn static_cycle_check(
    registry: &NodeRegistry,
    conns: &ConnectionIndex,
) -> Result<(), ConfigError> {
    let edges = all_edges(registry, conns);
    if topo_order(&edges, all_keys(registry)).is_none() {
        return Err(ConfigError::DependencyCycle(
            "cycle detected in the static feedthrough/internal-deps projection".to_string(),
        ));
    }
    Ok(())
}

fn all_keys(registry: &NodeRegistry) -> Vec<BlockKey> {
    registry
        .ids()
        .flat_map(|id| {
            registry
                .get(id)
                .into_iter()
                .flat_map(move |n| n.blocks.iter().map(move |b| (id, b.local_id)))
        })
        .collect()
}

/// Kahn's algorithm restricted to the given node set, returning `None` on a
/// cycle. Does not itself tie-break (callers needing deterministic order
/// use `build_wave_dag`, which layers explicitly).
fn topo_order(edges: &[(BlockKey, BlockKey)], keys: Vec<BlockKey>) -> Option<Vec<BlockKey>> {
    let key_set: FxHashSet<BlockKey> = keys.iter().copied().collect();
    let mut indegree: FxHashMap<BlockKey, usize> = keys.iter().map(|k| (*k, 0)).collect();
    let mut adj: FxHashMap<BlockKey, Vec<BlockKey>> = FxHashMap::default();
    for (src, dst) in edges {
        if !key_set.contains(src) || !key_set.contains(dst) {
            continue;
        }
        adj.entry(*src).or_default().push(*dst);
        *indegree.entry(*dst).or_insert(0) += 1;
    }

    let mut ready: Vec<BlockKey> = keys
        .iter()
        .copied()
        .filter(|k| indegree[k] == 0)
        .collect();
    ready.sort();
    let mut order = Vec::with_capacity(keys.len());
    let mut idx = 0;
    while idx < ready.len() {
        let next = ready[idx];
        idx += 1;
        order.push(next);
        if let Some(targets) = adj.get(&next) {
            let mut newly_ready = Vec::new();
            for t in targets {
                let deg = indegree.get_mut(t).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(*t);
                }
            }
            newly_ready.sort();
            ready.extend(newly_ready);
        }
    }

    if order.len() == keys.len() {
        Some(order)
    } else {
        None
    }
}

/// Expands `fired` to a fixed point per spec.md §4.5 step 2: a block whose
/// output feeds a triggering input of another block causes that block to
/// fire at the same virtual time. Bounded by the total declared block
/// count; exceeding that bound means the static check (I2) should have
/// rejected this configuration, so it is reported defensively rather than
/// looping forever.
pub fn expand_triggers(
    fired: &mut Vec<BlockKey>,
    registry: &NodeRegistry,
    conns: &ConnectionIndex,
) -> Result<(), ConfigError> {
    let max_iters = all_keys(registry).len() + 1;
    let mut present: FxHashSet<BlockKey> = fired.iter().copied().collect();
    let mut frontier = fired.clone();

    for _ in 0..max_iters {
        if frontier.is_empty() {
            return Ok(());
        }
        let mut next_frontier = Vec::new();
        for (node_id, local_id) in &frontier {
            let node = match registry.get(*node_id) {
                Some(n) => n,
                None => continue,
            };
            let block = match node.block(*local_id) {
                Some(b) => b,
                None => continue,
            };
            for out_port in &block.output_ports {
                for (dst_node, dst_port) in conns.targets(*node_id, out_port) {
                    let dst_record = match registry.get(*dst_node) {
                        Some(r) => r,
                        None => continue,
                    };
                    for dst_block in &dst_record.blocks {
                        if dst_block.triggering_inputs.contains(dst_port) {
                            let key = (*dst_node, dst_block.local_id);
                            if present.insert(key) {
                                fired.push(key);
                                next_frontier.push(key);
                            }
                        }
                    }
                }
            }
        }
        frontier = next_frontier;
    }

    Err(ConfigError::DependencyCycle(
        "trigger expansion did not reach a fixed point; static check should have caught this"
            .to_string(),
    ))
}

/// Builds the wave DAG for one tick's fired set (spec.md §4.5 step 3) and
/// partitions it into topological waves (step 4): each wave is a maximal
/// antichain of blocks whose predecessors (within the fired set) have all
/// already appeared in an earlier wave. Tie-break within a wave is
/// `(node_id, block_id)` ascending, for the determinism contract (§4.5).
pub fn build_wave_dag(
    fired: &[BlockKey],
    registry: &NodeRegistry,
    conns: &ConnectionIndex,
) -> Result<Vec<Vec<BlockKey>>, ConfigError> {
    let fired_set: FxHashSet<BlockKey> = fired.iter().copied().collect();
    let edges: Vec<(BlockKey, BlockKey)> = all_edges(registry, conns)
        .into_iter()
        .filter(|(s, d)| fired_set.contains(s) && fired_set.contains(d))
        .collect();

    let mut indegree: FxHashMap<BlockKey, usize> = fired.iter().map(|k| (*k, 0)).collect();
    let mut adj: FxHashMap<BlockKey, Vec<BlockKey>> = FxHashMap::default();
    for (src, dst) in &edges {
        adj.entry(*src).or_default().push(*dst);
        *indegree.entry(*dst).or_insert(0) += 1;
    }

    let mut waves = Vec::new();
    let mut remaining: FxHashSet<BlockKey> = fired_set.clone();
    let mut scheduled_count = 0usize;

    while !remaining.is_empty() {
        let mut wave: Vec<BlockKey> = remaining
            .iter()
            .copied()
            .filter(|k| indegree.get(k).copied().unwrap_or(0) == 0)
            .collect();
        if wave.is_empty() {
            return Err(ConfigError::DependencyCycle(format!(
                "cycle detected while building the wave DAG over {} fired blocks",
                fired.len()
            )));
        }
        wave.sort();
        for key in &wave {
            remaining.remove(key);
            if let Some(targets) = adj.get(key) {
                for t in targets {
                    if let Some(deg) = indegree.get_mut(t) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
        }
        scheduled_count += wave.len();
        waves.push(wave);
    }
    debug_assert_eq!(scheduled_count, fired.len());

    Ok(waves)
}

/// The per-run connection context handed to the tick protocol: the frozen
/// registry plus the resolved connection index, bundled so `Coordinator`
/// doesn't need to thread both through every call.
pub struct UpdateGraph {
    pub connections: ConnectionIndex,
}

impl UpdateGraph {
    pub fn build(
        registry: &NodeRegistry,
        config: &SystemConfig,
    ) -> Result<Self, ConfigError> {
        let connections = ConnectionIndex::build(registry, &config.connections)?;
        static_cycle_check(registry, &connections)?;
        Ok(Self { connections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdGen;
    use smn_types::config::{BlockSpec, ConnectionSpec, Deadlines, NodeSpec, PortDirection, PortSpec};
    use std::time::Duration;

    fn deadlines() -> Deadlines {
        Deadlines {
            init: Duration::from_millis(500),
            y: Duration::from_millis(200),
            x: Duration::from_millis(200),
            term: Duration::from_millis(200),
        }
    }

    /// Node A produces output `y`; node B's block has `u` as a feedthrough
    /// input connected to A.y (spec.md §8 scenario 2).
    fn feedthrough_config() -> SystemConfig {
        SystemConfig {
            name: "ft".into(),
            nodes: vec![
                NodeSpec {
                    name: "A".into(),
                    needs_state_update: true,
                    ports: vec![PortSpec {
                        name: "y".into(),
                        direction: PortDirection::Output,
                    }],
                    blocks: vec![BlockSpec {
                        local_id: 0,
                        period: 1000,
                        feedthrough_inputs: vec![],
                        triggering_inputs: vec![],
                        output_ports: vec!["y".into()],
                        internal_deps: vec![],
                    }],
                },
                NodeSpec {
                    name: "B".into(),
                    needs_state_update: true,
                    ports: vec![PortSpec {
                        name: "u".into(),
                        direction: PortDirection::Input,
                    }],
                    blocks: vec![BlockSpec {
                        local_id: 0,
                        period: 1000,
                        feedthrough_inputs: vec!["u".into()],
                        triggering_inputs: vec![],
                        output_ports: vec![],
                        internal_deps: vec![],
                    }],
                },
            ],
            connections: vec![ConnectionSpec {
                src_node: "A".into(),
                src_port: "y".into(),
                dst_node: "B".into(),
                dst_port: "u".into(),
            }],
            time_unit: smn_types::time::TimeUnit::Microseconds,
            final_time: 5000,
            deadlines: deadlines(),
        }
    }

    #[test]
    fn feedthrough_produces_two_waves_in_order() {
        let cfg = feedthrough_config();
        let mut id_gen = IdGen::new();
        let registry = crate::registry::NodeRegistry::from_config(&cfg, &mut id_gen);
        let graph = UpdateGraph::build(&registry, &cfg).unwrap();

        let fired = vec![(0, 0), (1, 0)];
        let waves = build_wave_dag(&fired, &registry, &graph.connections).unwrap();
        assert_eq!(waves, vec![vec![(0, 0)], vec![(1, 0)]]);
    }

    #[test]
    fn static_check_rejects_a_cycle() {
        let mut cfg = feedthrough_config();
        // Make B also feed back into A, creating a cycle.
        cfg.nodes[1].ports.push(PortSpec {
            name: "v".into(),
            direction: PortDirection::Output,
        });
        cfg.nodes[1].blocks[0].output_ports.push("v".into());
        cfg.nodes[0].ports.push(PortSpec {
            name: "w".into(),
            direction: PortDirection::Input,
        });
        cfg.nodes[0].blocks[0].feedthrough_inputs.push("w".into());
        cfg.connections.push(ConnectionSpec {
            src_node: "B".into(),
            src_port: "v".into(),
            dst_node: "A".into(),
            dst_port: "w".into(),
        });

        let mut id_gen = IdGen::new();
        let registry = crate::registry::NodeRegistry::from_config(&cfg, &mut id_gen);
        let err = UpdateGraph::build(&registry, &cfg).unwrap_err();
        assert!(matches!(err, ConfigError::DependencyCycle(_)));
    }

    #[test]
    fn trigger_expansion_adds_event_only_block_at_same_tick() {
        let mut cfg = feedthrough_config();
        cfg.nodes[1].blocks[0].feedthrough_inputs.clear();
        cfg.nodes[1].blocks[0].triggering_inputs.push("u".into());
        cfg.nodes[1].blocks[0].period = 0;

        let mut id_gen = IdGen::new();
        let registry = crate::registry::NodeRegistry::from_config(&cfg, &mut id_gen);
        let graph = UpdateGraph::build(&registry, &cfg).unwrap();

        let mut fired = vec![(0, 0)];
        expand_triggers(&mut fired, &registry, &graph.connections).unwrap();
        assert!(fired.contains(&(1, 0)));
    }
}
