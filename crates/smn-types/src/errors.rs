//! # smn-types::errors
//!
//! Defines the common error kinds used throughout the SMN workspace
//! (spec.md §7). Using `thiserror` provides clean, descriptive error
//! handling with a deterministic `Debug` implementation.

use crate::id::NodeId;
use crate::time::SimTime;
use thiserror::Error;

/// A general-purpose error for the coordinator's internal bookkeeping.
#[derive(Error, Debug, Clone)]
pub enum SimError {
    #[error("virtual time overflow: {base} + {offset}")]
    TimeOverflow { base: SimTime, offset: SimTime },
    #[error("virtual time underflow: {base} - {offset}")]
    TimeUnderflow { base: SimTime, offset: SimTime },
    #[error("monotonic id counter overflowed")]
    IdOverflow,
    #[error("node with id {0} not found")]
    NodeNotFound(NodeId),
}

/// Detected at setup, before the run begins (spec.md §7).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported configuration file extension: {0:?}")]
    UnsupportedExtension(Option<String>),
    #[error("duplicate node name '{0}'")]
    DuplicateNodeName(String),
    #[error("node '{node}' block {local_id} references unknown port '{port}'")]
    UnknownPort {
        node: String,
        local_id: u16,
        port: String,
    },
    #[error("node '{node}' block {local_id} has negative or invalid period")]
    InvalidPeriod { node: String, local_id: u16 },
    #[error("node '{node}' declares {count} blocks, exceeding the {max} supported by the wire mask")]
    TooManyBlocks {
        node: String,
        count: usize,
        max: usize,
    },
    #[error("node '{node}' block local_id {local_id} is out of the wire mask's 0..{max} range")]
    LocalIdOutOfRange {
        node: String,
        local_id: u16,
        max: usize,
    },
    #[error("connection references unknown node '{0}'")]
    UnknownNode(String),
    #[error(
        "dependency cycle detected in the static feedthrough/internal-deps projection: {0}"
    )]
    DependencyCycle(String),
    #[error("validation error in scenario '{name}': {message}")]
    Validation { name: String, message: String },
}

/// A malformed wire frame (spec.md §4.1, §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("unknown message kind discriminant {0}")]
    UnknownKind(u8),
    #[error("malformed fields in frame: {0}")]
    BadFields(String),
}

/// A transport-level failure on a specific node's endpoint (spec.md §4.2, §7).
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("node {0}: endpoint not registered")]
    NotRegistered(NodeId),
    #[error("node {0}: connect failed: {1}")]
    ConnectFailed(NodeId, String),
    #[error("node {0}: send failed: {1}")]
    SendFailed(NodeId, String),
    #[error("node {0}: endpoint permanently lost")]
    PermanentlyDown(NodeId),
}

/// A protocol violation observed at the wire-message level (spec.md §7).
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("ack from node {0} for unexpected mask {1:#x} (expected {2:#x})")]
    UnexpectedAckMask(NodeId, u64, u64),
    #[error("ack from unregistered node {0}")]
    UnregisteredAck(NodeId),
    #[error("message from node {0} arrived out of phase: expected {expected}, got {got}")]
    OutOfPhase {
        node: NodeId,
        expected: &'static str,
        got: &'static str,
    },
}

/// A deadline missed after all policy-allowed resends (spec.md §4.6, §7).
#[derive(Error, Debug, Clone)]
pub enum TimeoutError {
    #[error("node {node} missed its {phase} deadline after {resends} resend(s)")]
    DeadlineMissed {
        node: NodeId,
        phase: &'static str,
        resends: u32,
    },
}

/// A node registration could not be accepted (spec.md §4.3).
#[derive(Error, Debug, Clone)]
pub enum RegistrationError {
    #[error("node name '{0}' is not declared in the system configuration")]
    UnknownName(String),
    #[error(
        "node '{name}' re-registered with a block catalog that does not match its declared signature"
    )]
    RegistrationConflict { name: String },
    #[error("registry is frozen; no further registration is accepted after setup closes")]
    RegistryFrozen,
}

/// A node reported `SIM_ERROR` (spec.md §4.6, §7).
#[derive(Error, Debug, Clone)]
#[error("node {node} reported an error: {info}")]
pub struct NodeError {
    pub node: NodeId,
    pub info: String,
}

/// The union of error kinds that can terminate a run, carried in the final
/// report event (spec.md §7).
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("{0}")]
    Codec(CodecError),
    #[error("dependency cycle detected mid-run (should have been caught at setup): {0}")]
    DependencyCycle(String),
}
