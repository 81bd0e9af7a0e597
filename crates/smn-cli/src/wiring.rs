//! # smn-cli::wiring
//!
//! Resolves CLI arguments into the pieces `Coordinator::new` needs: a
//! loaded `SystemConfig`, a transport backend, and the endpoint map that
//! backend registers nodes against.

use crate::args::TransportKind;
use fxhash::FxHashMap;
use smn_engine::transport::{broker::BrokerTransport, nameserver::NameServerTransport, Endpoint, Transport};
use smn_types::{config::SystemConfig, id::NodeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

/// Loads a `SystemConfig` from a TOML or YAML file, chosen by extension.
pub fn load_config(path: &Path) -> anyhow::Result<SystemConfig> {
    Ok(SystemConfig::from_path(path)?)
}

/// Loads a node-name -> socket-address map and resolves it against the
/// config's node names into the `NodeId`-keyed form `Coordinator::new` and
/// `NameServerTransport` expect. A node the map has no entry for falls back
/// to `Endpoint::Broker` when the coordinator registers it.
pub fn load_endpoints(
    path: &Path,
    config: &SystemConfig,
) -> anyhow::Result<FxHashMap<NodeId, Endpoint>> {
    let content = std::fs::read_to_string(path)?;
    let by_name: HashMap<String, SocketAddr> = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        other => anyhow::bail!("unsupported endpoints file extension: {:?}", other),
    };

    let mut resolved = FxHashMap::default();
    for (name, idx) in config.node_index_by_name() {
        if let Some(addr) = by_name.get(name) {
            resolved.insert(idx as NodeId, Endpoint::Tcp(*addr));
        }
    }
    Ok(resolved)
}

/// Builds the transport backend requested on the command line. The broker
/// backend starts with no nodes connected; an in-process embedder connects
/// them via `BrokerTransport::connect` before the coordinator's setup phase
/// runs.
pub fn build_transport(kind: TransportKind) -> Box<dyn Transport> {
    match kind {
        TransportKind::Broker => Box::new(BrokerTransport::new()),
        TransportKind::Tcp => Box::new(NameServerTransport::new()),
    }
}
