//! # smn-engine::transport::broker
//!
//! An in-process pub/sub broker transport, built on `crossbeam-channel`
//! exactly as the teacher's `net` module uses a single shared delivery
//! queue: one unicast channel per registered node for coordinator→node
//! traffic, and one shared channel every node publishes acks/events into
//! for node→coordinator traffic, which `recv` polls. Suited to embedding
//! the coordinator and its nodes in one process (in-process tests, or a
//! single-machine deployment where nodes are threads rather than separate
//! processes).

use super::{Endpoint, RecvOutcome, Transport, TransportEvent};
use fxhash::FxHashMap;
use smn_proto::Frame;
use smn_types::{errors::TransportError, id::NodeId};
use std::time::Duration;

/// The coordinator-side half of the broker.
pub struct BrokerTransport {
    to_node: FxHashMap<NodeId, crossbeam_channel::Sender<Frame>>,
    from_nodes_rx: crossbeam_channel::Receiver<TransportEvent>,
    from_nodes_tx: crossbeam_channel::Sender<TransportEvent>,
}

/// The node-side half: a handle a node process (or in-process stub) uses
/// to exchange frames with the coordinator over the same broker.
pub struct NodeHandle {
    node_id: NodeId,
    inbox_rx: crossbeam_channel::Receiver<Frame>,
    outbox_tx: crossbeam_channel::Sender<TransportEvent>,
}

impl NodeHandle {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Blocks until the coordinator sends this node a frame, or the
    /// deadline elapses.
    pub fn recv(&self, deadline: Duration) -> Option<Frame> {
        self.inbox_rx.recv_timeout(deadline).ok()
    }

    /// Publishes a frame (typically a `SIM_ACK` or `SIM_EVENT`) to the
    /// coordinator's incoming queue.
    pub fn send(&self, frame: Frame) {
        let _ = self.outbox_tx.send(TransportEvent::Message {
            node_id: self.node_id,
            frame,
        });
    }

    /// Synthesizes a permanent-loss event, as a real broker's liveness
    /// detector would on a dropped connection.
    pub fn report_down(&self) {
        let _ = self.outbox_tx.send(TransportEvent::Down {
            node_id: self.node_id,
        });
    }
}

impl BrokerTransport {
    pub fn new() -> Self {
        let (from_nodes_tx, from_nodes_rx) = crossbeam_channel::unbounded();
        Self {
            to_node: FxHashMap::default(),
            from_nodes_rx,
            from_nodes_tx,
        }
    }

    /// Connects a node to the broker, returning its node-side handle. Call
    /// once per node during setup, then pass the handle to that node's
    /// process (or in-process stub).
    pub fn connect(&mut self, node_id: NodeId) -> NodeHandle {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.to_node.insert(node_id, tx);
        NodeHandle {
            node_id,
            inbox_rx: rx,
            outbox_tx: self.from_nodes_tx.clone(),
        }
    }
}

impl Default for BrokerTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for BrokerTransport {
    fn register(&mut self, node_id: NodeId, endpoint: Endpoint) -> Result<(), TransportError> {
        match endpoint {
            Endpoint::Broker => {
                if self.to_node.contains_key(&node_id) {
                    Ok(())
                } else {
                    Err(TransportError::NotRegistered(node_id))
                }
            }
            Endpoint::Tcp(_) => Err(TransportError::ConnectFailed(
                node_id,
                "broker transport cannot register a TCP endpoint".to_string(),
            )),
        }
    }

    fn send(&mut self, node_id: NodeId, frame: Frame) -> Result<(), TransportError> {
        match self.to_node.get(&node_id) {
            Some(tx) => tx.send(frame).map_err(|_| {
                self.to_node.remove(&node_id);
                TransportError::PermanentlyDown(node_id)
            }),
            None => Err(TransportError::NotRegistered(node_id)),
        }
    }

    fn broadcast(&mut self, frame: Frame) {
        for tx in self.to_node.values() {
            let _ = tx.send(frame.clone());
        }
    }

    fn recv(&mut self, deadline: Duration) -> RecvOutcome {
        match self.from_nodes_rx.recv_timeout(deadline) {
            Ok(event) => RecvOutcome::Event(event),
            Err(_) => RecvOutcome::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smn_proto::{MsgKind, Payload};

    fn frame(kind: MsgKind, payload: Payload) -> Frame {
        Frame {
            msg_type: kind,
            sim_time: 0,
            node_id: 0,
            mask: 0,
            payload,
        }
    }

    #[test]
    fn round_trips_a_message_through_the_broker() {
        let mut broker = BrokerTransport::new();
        let handle = broker.connect(0);

        broker
            .send(0, frame(MsgKind::Term, Payload::Term))
            .unwrap();
        let received = handle.recv(Duration::from_millis(100)).unwrap();
        assert_eq!(received.msg_type, MsgKind::Term);

        handle.send(frame(
            MsgKind::Ack,
            Payload::Ack {
                status: smn_proto::AckStatus::Ok,
                next_event_time: None,
            },
        ));
        match broker.recv(Duration::from_millis(100)) {
            RecvOutcome::Event(TransportEvent::Message { node_id, .. }) => assert_eq!(node_id, 0),
            _ => panic!("expected a message event"),
        }
    }

    #[test]
    fn send_to_unregistered_node_fails() {
        let mut broker = BrokerTransport::new();
        let err = broker.send(7, frame(MsgKind::Term, Payload::Term)).unwrap_err();
        assert!(matches!(err, TransportError::NotRegistered(7)));
    }

    #[test]
    fn recv_times_out_when_idle() {
        let mut broker = BrokerTransport::new();
        match broker.recv(Duration::from_millis(10)) {
            RecvOutcome::Timeout => {}
            _ => panic!("expected a timeout"),
        }
    }
}
