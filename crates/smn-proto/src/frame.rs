//! # smn-proto::frame
//!
//! Defines the `Frame` wire type and its length-prefixed `postcard`
//! encoding (spec.md §6): a `u32` little-endian byte count followed by
//! the `postcard`-encoded frame body. Every frame carries the same five
//! top-level fields; `payload` carries the kind-specific substructure.
//! Unlike the teacher's envelope type, `payload` never carries an opaque
//! `bytes::Bytes` blob — the SMN does not touch node payloads (spec.md
//! §3), so every field here is part of the fixed coordination schema.

use serde::{Deserialize, Serialize};
use smn_types::errors::CodecError;

/// The wire discriminant for a frame's message kind (spec.md §6). Fixed
/// numeric values, independent of the `Payload` enum's own tag, so an
/// out-of-range discriminant can be reported as `CodecError::UnknownKind`
/// rather than a generic decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MsgKind {
    Init = 0,
    Y = 1,
    X = 2,
    Ack = 3,
    Event = 4,
    Term = 5,
    Error = 6,
    OpenPort = 7,
    RequestConnect = 8,
}

impl MsgKind {
    const MAX_DISCRIMINANT: u8 = MsgKind::RequestConnect as u8;
}

/// The status a node reports alongside an acknowledgment (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    Ok,
    Error,
}

/// The kind-specific body carried inside a `Frame`. `Y`/`X` carry no
/// payload of their own — the fired-block set is the frame's `mask`
/// field, shared across both phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// SMN→N: the global time unit and the node's confirmed block catalog.
    Init {
        atom_nanos: u64,
        block_ids: Vec<u16>,
    },
    Y,
    X,
    /// N→SMN: the mask acknowledged, a status, and an optional request to
    /// be woken again at a future virtual time (an irregular event folded
    /// into the ack rather than sent separately).
    Ack {
        status: AckStatus,
        next_event_time: Option<i64>,
    },
    /// N→SMN: a node-initiated request to fire a specific local block at
    /// a future virtual time.
    Event { local_id: u16, fire_time: i64 },
    Term,
    /// N→SMN or SMN→N: a human-readable failure description.
    Error { info: String },
    /// N→SMN: announces a dynamically opened port (spec.md §9, Open
    /// Question on late-joining nodes).
    OpenPort { port_name: String },
    /// N→SMN: requests a connection to a port on another node, resolved
    /// by the coordinator against `SystemConfig::connections`.
    RequestConnect {
        node_name: String,
        port_name: String,
    },
}

/// A single message exchanged between the coordinator and a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub msg_type: MsgKind,
    pub sim_time: i64,
    pub node_id: i32,
    pub mask: u64,
    pub payload: Payload,
}

/// Encodes a frame with its `u32` little-endian length prefix.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let body = postcard::to_allocvec(frame)
        .map_err(|e| CodecError::BadFields(e.to_string()))?;
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decodes exactly one length-prefixed frame from the front of `bytes`,
/// returning the frame and the number of bytes consumed. Used by
/// transport readers to carve frames out of a byte stream one at a time.
pub fn decode_length_prefixed(bytes: &[u8]) -> Result<(Frame, usize), CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::Truncated {
            expected: 4,
            actual: bytes.len(),
        });
    }
    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let total = 4 + len;
    if bytes.len() < total {
        return Err(CodecError::Truncated {
            expected: total,
            actual: bytes.len(),
        });
    }
    let frame = decode_frame(&bytes[4..total])?;
    Ok((frame, total))
}

/// Decodes a single frame body (without the length prefix).
pub fn decode_frame(body: &[u8]) -> Result<Frame, CodecError> {
    if body.is_empty() {
        return Err(CodecError::Truncated {
            expected: 1,
            actual: 0,
        });
    }
    postcard::from_bytes(body).map_err(|_| classify_decode_failure(body))
}

/// `postcard` reports decode failures as a flat `Error` with no access to
/// the raw bytes it rejected, so a failed decode is re-inspected here: an
/// out-of-range leading discriminant is reported precisely, anything else
/// falls back to a generic malformed-fields error.
fn classify_decode_failure(body: &[u8]) -> CodecError {
    match body.first() {
        Some(&raw) if raw > MsgKind::MAX_DISCRIMINANT => CodecError::UnknownKind(raw),
        _ => CodecError::BadFields("frame did not match the wire schema".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload: Payload, mask: u64) -> Frame {
        Frame {
            msg_type: MsgKind::Y,
            sim_time: 42,
            node_id: 3,
            mask,
            payload,
        }
    }

    #[test]
    fn round_trips_init() {
        let frame = Frame {
            msg_type: MsgKind::Init,
            sim_time: 0,
            node_id: 1,
            mask: 0,
            payload: Payload::Init {
                atom_nanos: 1_000,
                block_ids: vec![0, 1, 2],
            },
        };
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(decode_frame(&bytes[4..]).unwrap(), frame);
    }

    #[test]
    fn round_trips_y_and_x() {
        let y = sample(Payload::Y, 0b101);
        let bytes = encode_frame(&y).unwrap();
        assert_eq!(decode_frame(&bytes[4..]).unwrap(), y);

        let mut x = y.clone();
        x.msg_type = MsgKind::X;
        x.payload = Payload::X;
        let bytes = encode_frame(&x).unwrap();
        assert_eq!(decode_frame(&bytes[4..]).unwrap(), x);
    }

    #[test]
    fn round_trips_ack_with_next_event() {
        let frame = sample(
            Payload::Ack {
                status: AckStatus::Ok,
                next_event_time: Some(1500),
            },
            0b1,
        );
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(decode_frame(&bytes[4..]).unwrap(), frame);
    }

    #[test]
    fn round_trips_event() {
        let frame = sample(
            Payload::Event {
                local_id: 0,
                fire_time: 1500,
            },
            0,
        );
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(decode_frame(&bytes[4..]).unwrap(), frame);
    }

    #[test]
    fn length_prefixed_round_trip_reports_bytes_consumed() {
        let frame = sample(Payload::Term, 0);
        let bytes = encode_frame(&frame).unwrap();
        let (decoded, consumed) = decode_length_prefixed(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn truncated_length_prefix_is_reported() {
        let err = decode_length_prefixed(&[0, 1]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn truncated_body_is_reported() {
        let frame = sample(Payload::Term, 0);
        let bytes = encode_frame(&frame).unwrap();
        let err = decode_length_prefixed(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn unknown_kind_discriminant_is_reported() {
        let mut body = postcard::to_allocvec(&sample(Payload::Term, 0)).unwrap();
        body[0] = 200;
        let err = decode_frame(&body).unwrap_err();
        assert!(matches!(err, CodecError::UnknownKind(200)));
    }
}
