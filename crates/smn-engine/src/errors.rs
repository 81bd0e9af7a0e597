//! # smn-engine::errors
//!
//! Internal error type for bookkeeping failures that do not fit the
//! `smn-types::errors` vocabulary (spec.md §7 enumerates the user-visible
//! kinds; this crate only needs a thin wrapper for coordinator-internal
//! invariant violations).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("event queue entry referenced unknown node {0}")]
    UnknownNode(smn_types::id::NodeId),
}
