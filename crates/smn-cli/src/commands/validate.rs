//! # smn-cli::commands::validate
//!
//! Implements the `validate` subcommand: loads a system configuration and
//! runs every static check spec.md §7 requires before a run is allowed to
//! start, without constructing a transport or driving a coordinator.

use crate::wiring;
use anyhow::{Context, Result};
use smn_engine::graph::UpdateGraph;
use smn_engine::ids::IdGen;
use smn_engine::registry::NodeRegistry;
use std::path::PathBuf;

pub fn exec(path: PathBuf) -> Result<()> {
    let config = wiring::load_config(&path).context("loading system configuration")?;
    config.validate().context("validating system configuration")?;

    let mut id_gen = IdGen::new();
    let registry = NodeRegistry::from_config(&config, &mut id_gen);
    UpdateGraph::build(&registry, &config).context("checking the update-dependency graph")?;

    println!("'{}' is valid: {} node(s), final_time={}", config.name, config.nodes.len(), config.final_time);
    Ok(())
}
