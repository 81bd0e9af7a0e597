//! # smn-proto
//!
//! The wire codec for messages exchanged between the coordinator and
//! nodes (spec.md §4.1, §6). A frame is a length-prefixed,
//! `postcard`-encoded `Frame` value; this crate owns encoding, decoding,
//! and the `MsgKind`/`Payload` vocabulary, and is deliberately ignorant
//! of transport (sockets, channels) and scheduling — those live in
//! `smn-engine`.

#![forbid(unsafe_code)]

pub mod frame;

pub use frame::{
    decode_frame, decode_length_prefixed, encode_frame, AckStatus, Frame, MsgKind, Payload,
};
