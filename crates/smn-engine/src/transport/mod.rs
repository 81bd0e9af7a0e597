//! # smn-engine::transport
//!
//! The transport capability (spec.md §4.2): a narrow polymorphic boundary
//! the coordinator requires — `register`, `send`, `broadcast`, `recv` — not
//! an inheritance tree, per the DESIGN NOTES. Two backends are provided:
//! `BrokerTransport` (in-process pub/sub over `crossbeam-channel`) and
//! `NameServerTransport` (TCP sockets resolved via a name-server address
//! map). Both guarantee in-order delivery to a single node and present the
//! coordinator a single pollable `recv` queue, satisfying spec.md §5's
//! "Transport I/O may use background threads internally but presents to
//! the coordinator a single queue."

pub mod broker;
pub mod nameserver;

use smn_proto::Frame;
use smn_types::{errors::TransportError, id::NodeId};
use std::time::Duration;

/// The opaque address a transport resolves a node's declared
/// `transport_endpoint` to (spec.md §3). Each backend only understands its
/// own variant; passing the wrong kind to a backend is a `TransportError`.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// The broker backend addresses nodes purely by id; no payload needed.
    Broker,
    /// The name-server backend resolves a node to a socket address.
    Tcp(std::net::SocketAddr),
}

/// An event surfaced by `recv`: either a message from a node, or a
/// permanent endpoint loss synthesized by the backend's background thread
/// (spec.md §4.2's `TransportDown(node_id)`).
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message { node_id: NodeId, frame: Frame },
    Down { node_id: NodeId },
}

/// The outcome of polling `recv` for up to `deadline`.
pub enum RecvOutcome {
    Event(TransportEvent),
    Timeout,
}

/// The capability the coordinator requires of a transport backend
/// (spec.md §4.2). Implementations own their reconnection policy; only a
/// permanent failure is surfaced to the coordinator, as `TransportDown`.
pub trait Transport: Send {
    /// Establishes the stable node-id-to-endpoint mapping (setup only).
    fn register(&mut self, node_id: NodeId, endpoint: Endpoint) -> Result<(), TransportError>;

    /// Non-blocking send to one node; fails only on permanent endpoint loss.
    fn send(&mut self, node_id: NodeId, frame: Frame) -> Result<(), TransportError>;

    /// Best-effort send to every registered node; no ordering guarantee
    /// across receivers (spec.md §4.2).
    fn broadcast(&mut self, frame: Frame);

    /// Polls the single incoming queue, blocking up to `deadline`.
    fn recv(&mut self, deadline: Duration) -> RecvOutcome;
}
