//! # smn-types
//!
//! This crate provides the foundational, shared data types used across the
//! entire openBuildNet SMN workspace. Its purpose is to break dependency
//! cycles by providing a stable, central location for types that
//! `smn-engine`, `smn-proto`, and `smn-cli` all need to agree upon.

#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod id;
pub mod metrics;
pub mod time;
