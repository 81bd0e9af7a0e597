//! # smn-engine::transport::nameserver
//!
//! A transport that resolves each node's declared `transport_endpoint` to a
//! `TcpStream` via a name-server address map supplied at construction,
//! framing messages with the `smn-proto` codec over the stream. A
//! background reader thread per connection carves length-prefixed frames
//! out of the stream and feeds them into the shared `recv` queue; `send`
//! and `broadcast` write directly, mutex-guarded per stream, since only
//! the coordinator thread ever calls them (spec.md §4.2, §5).

use super::{Endpoint, RecvOutcome, Transport, TransportEvent};
use fxhash::FxHashMap;
use smn_proto::{decode_length_prefixed, encode_frame, Frame};
use smn_types::{errors::TransportError, id::NodeId};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Connection {
    stream: Arc<Mutex<TcpStream>>,
}

/// A transport backed by real TCP sockets, one per registered node.
pub struct NameServerTransport {
    connections: FxHashMap<NodeId, Connection>,
    incoming_tx: crossbeam_channel::Sender<TransportEvent>,
    incoming_rx: crossbeam_channel::Receiver<TransportEvent>,
}

impl NameServerTransport {
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = crossbeam_channel::unbounded();
        Self {
            connections: FxHashMap::default(),
            incoming_tx,
            incoming_rx,
        }
    }

    /// Spawns the background reader thread for a freshly connected socket.
    /// It carves frames out of the stream one at a time, forwarding each to
    /// the shared incoming queue, and reports `TransportEvent::Down` when
    /// the connection is permanently lost (read error or clean EOF).
    fn spawn_reader(node_id: NodeId, stream: TcpStream, tx: crossbeam_channel::Sender<TransportEvent>) {
        std::thread::Builder::new()
            .name(format!("smn-nameserver-reader-{node_id}"))
            .spawn(move || {
                let mut stream = stream;
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    match stream.read(&mut chunk) {
                        Ok(0) => {
                            let _ = tx.send(TransportEvent::Down { node_id });
                            return;
                        }
                        Ok(n) => {
                            buf.extend_from_slice(&chunk[..n]);
                            loop {
                                match decode_length_prefixed(&buf) {
                                    Ok((frame, consumed)) => {
                                        buf.drain(..consumed);
                                        if tx
                                            .send(TransportEvent::Message { node_id, frame })
                                            .is_err()
                                        {
                                            return;
                                        }
                                    }
                                    Err(smn_types::errors::CodecError::Truncated { .. }) => break,
                                    Err(_) => {
                                        // Malformed frame: drop it and resync on the
                                        // next length prefix rather than tearing down
                                        // the whole connection (spec.md §7: CodecError
                                        // on a single frame is recovered locally).
                                        if buf.len() >= 4 {
                                            buf.drain(..4);
                                        } else {
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                        Err(_) => {
                            let _ = tx.send(TransportEvent::Down { node_id });
                            return;
                        }
                    }
                }
            })
            .expect("spawning transport reader thread");
    }
}

impl Default for NameServerTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for NameServerTransport {
    fn register(&mut self, node_id: NodeId, endpoint: Endpoint) -> Result<(), TransportError> {
        let addr = match endpoint {
            Endpoint::Tcp(addr) => addr,
            Endpoint::Broker => {
                return Err(TransportError::ConnectFailed(
                    node_id,
                    "name-server transport requires a TCP endpoint".to_string(),
                ))
            }
        };
        let stream = TcpStream::connect(addr)
            .map_err(|e| TransportError::ConnectFailed(node_id, e.to_string()))?;
        let reader_stream = stream
            .try_clone()
            .map_err(|e| TransportError::ConnectFailed(node_id, e.to_string()))?;
        Self::spawn_reader(node_id, reader_stream, self.incoming_tx.clone());
        self.connections.insert(
            node_id,
            Connection {
                stream: Arc::new(Mutex::new(stream)),
            },
        );
        Ok(())
    }

    fn send(&mut self, node_id: NodeId, frame: Frame) -> Result<(), TransportError> {
        let conn = self
            .connections
            .get(&node_id)
            .ok_or(TransportError::NotRegistered(node_id))?;
        let bytes = encode_frame(&frame)
            .map_err(|e| TransportError::SendFailed(node_id, e.to_string()))?;
        let mut stream = conn.stream.lock().expect("transport stream mutex poisoned");
        stream
            .write_all(&bytes)
            .map_err(|e| TransportError::SendFailed(node_id, e.to_string()))
    }

    fn broadcast(&mut self, frame: Frame) {
        let ids: Vec<NodeId> = self.connections.keys().copied().collect();
        for node_id in ids {
            let _ = self.send(node_id, frame.clone());
        }
    }

    fn recv(&mut self, deadline: Duration) -> RecvOutcome {
        match self.incoming_rx.recv_timeout(deadline) {
            Ok(event) => RecvOutcome::Event(event),
            Err(_) => RecvOutcome::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smn_proto::{MsgKind, Payload};
    use std::net::TcpListener;

    #[test]
    fn sends_a_frame_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 256];
            let n = sock.read(&mut buf).unwrap();
            decode_length_prefixed(&buf[..n]).unwrap().0
        });

        let mut transport = NameServerTransport::new();
        transport.register(0, Endpoint::Tcp(addr)).unwrap();
        transport
            .send(
                0,
                Frame {
                    msg_type: MsgKind::Term,
                    sim_time: 42,
                    node_id: 0,
                    mask: 0,
                    payload: Payload::Term,
                },
            )
            .unwrap();

        let received = server.join().unwrap();
        assert_eq!(received.sim_time, 42);
    }
}
