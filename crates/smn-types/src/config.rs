//! # smn-types::config
//!
//! Defines the `SystemConfig` schema: the single immutable value the setup
//! layer hands to the coordinator at construction (spec.md §6, §9). These
//! types are deliberately dumb data — `serde` maps TOML/YAML onto them, and
//! `SystemConfig::validate` performs the static checks spec.md §7 requires
//! before a run is allowed to start. The coordinator never mutates this
//! value once a run begins.

use crate::{
    errors::ConfigError,
    id::{BlockLocalId, MAX_BLOCKS_PER_NODE},
    time::{SimTime, TimeUnit},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// The top-level, immutable configuration for one coordinator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
    pub time_unit: TimeUnit,
    pub final_time: SimTime,
    pub deadlines: Deadlines,
}

/// Per-phase wall-clock deadlines, all required — resolving spec.md §9(b)
/// by making every timeout an explicit configuration input rather than an
/// implicit default that could silently mask a hung node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Deadlines {
    #[serde(with = "duration_millis")]
    pub init: Duration,
    #[serde(with = "duration_millis")]
    pub y: Duration,
    #[serde(with = "duration_millis")]
    pub x: Duration,
    #[serde(with = "duration_millis")]
    pub term: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

/// A single node's declaration: its block catalog, ports, and whether it
/// participates in the UPDATE_X phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub needs_state_update: bool,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    pub blocks: Vec<BlockSpec>,
}

fn default_true() -> bool {
    true
}

/// A declared input/output/data port on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub direction: PortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
    Data,
}

/// A single schedulable block within a node (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSpec {
    pub local_id: BlockLocalId,
    /// Time atoms between firings; 0 means event-only (fires only when
    /// triggered). Deserialized from a signed integer so a negative
    /// period in the source file is caught as a deserialization error
    /// rather than silently wrapping.
    #[serde(deserialize_with = "deserialize_period")]
    pub period: SimTime,
    #[serde(default)]
    pub feedthrough_inputs: Vec<String>,
    #[serde(default)]
    pub triggering_inputs: Vec<String>,
    #[serde(default)]
    pub output_ports: Vec<String>,
    #[serde(default)]
    pub internal_deps: Vec<BlockLocalId>,
}

fn deserialize_period<'de, D>(deserializer: D) -> Result<SimTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    if raw < 0 {
        return Err(serde::de::Error::custom(format!(
            "block period must be non-negative, got {raw}"
        )));
    }
    Ok(raw as SimTime)
}

/// A directed edge from one output port to one input port, used only to
/// derive cross-node feedthrough dependencies (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub src_node: String,
    pub src_port: String,
    pub dst_node: String,
    pub dst_port: String,
}

impl SystemConfig {
    /// Reads and parses a `SystemConfig` from a TOML or YAML file, chosen
    /// by the path's extension. Does not call `validate` — callers run
    /// that separately so a caller constructing a config in-memory (tests,
    /// embedders) isn't forced through the filesystem.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            other => Err(ConfigError::UnsupportedExtension(other.map(str::to_string))),
        }
    }

    /// Performs the static validation spec.md §7 requires before a run
    /// begins: duplicate node names, blocks referencing unknown ports,
    /// negative periods (caught at deserialization above), and a block
    /// count within the wire mask's 64-bit width. Cycle detection over the
    /// feedthrough/internal-deps projection (I2) is performed by
    /// `smn-engine::graph` once the config is loaded, since it needs the
    /// full cross-node connection graph rather than per-node structure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_names = HashSet::new();
        for node in &self.nodes {
            if !seen_names.insert(node.name.as_str()) {
                return Err(ConfigError::DuplicateNodeName(node.name.clone()));
            }
            if node.blocks.len() > MAX_BLOCKS_PER_NODE {
                return Err(ConfigError::TooManyBlocks {
                    node: node.name.clone(),
                    count: node.blocks.len(),
                    max: MAX_BLOCKS_PER_NODE,
                });
            }

            let port_names: HashSet<&str> = node.ports.iter().map(|p| p.name.as_str()).collect();
            let local_ids: HashSet<BlockLocalId> =
                node.blocks.iter().map(|b| b.local_id).collect();

            for block in &node.blocks {
                if block.local_id as usize >= MAX_BLOCKS_PER_NODE {
                    return Err(ConfigError::LocalIdOutOfRange {
                        node: node.name.clone(),
                        local_id: block.local_id,
                        max: MAX_BLOCKS_PER_NODE,
                    });
                }
                for port in block
                    .feedthrough_inputs
                    .iter()
                    .chain(block.triggering_inputs.iter())
                    .chain(block.output_ports.iter())
                {
                    if !port_names.contains(port.as_str()) {
                        return Err(ConfigError::UnknownPort {
                            node: node.name.clone(),
                            local_id: block.local_id,
                            port: port.clone(),
                        });
                    }
                }
                for dep in &block.internal_deps {
                    if !local_ids.contains(dep) {
                        return Err(ConfigError::Validation {
                            name: self.name.clone(),
                            message: format!(
                                "node '{}' block {} depends on unknown local block {}",
                                node.name, block.local_id, dep
                            ),
                        });
                    }
                }
            }
        }

        let node_names: HashSet<&str> = self.nodes.iter().map(|n| n.name.as_str()).collect();
        for conn in &self.connections {
            if !node_names.contains(conn.src_node.as_str()) {
                return Err(ConfigError::UnknownNode(conn.src_node.clone()));
            }
            if !node_names.contains(conn.dst_node.as_str()) {
                return Err(ConfigError::UnknownNode(conn.dst_node.clone()));
            }
        }

        Ok(())
    }

    /// Builds a name→index lookup, useful for resolving `ConnectionSpec`
    /// endpoints against `self.nodes`.
    pub fn node_index_by_name(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.as_str(), i))
            .collect()
    }
}
