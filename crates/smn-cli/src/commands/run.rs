//! # smn-cli::commands::run
//!
//! Implements the `run` subcommand: loads a system configuration, wires up
//! the requested transport, and drives a `Coordinator` to completion.

use crate::args::{RunOpts, TransportKind};
use crate::wiring;
use anyhow::{bail, Context, Result};
use fxhash::FxHashMap;
use smn_engine::coordinator::Coordinator;
use smn_engine::report::{ChannelReportSink, FanoutReportSink, FinishReason, ReportSink, TracingReportSink};
use smn_engine::transport::Endpoint;
use std::sync::Arc;

pub fn exec(opts: RunOpts) -> Result<()> {
    let mut config = wiring::load_config(&opts.config).context("loading system configuration")?;
    config.validate().context("validating system configuration")?;

    if let Some(stop_at) = opts.stop_at {
        config.final_time = stop_at;
    }

    let endpoints: FxHashMap<_, Endpoint> = match (opts.transport, &opts.endpoints) {
        (TransportKind::Tcp, Some(path)) => wiring::load_endpoints(path, &config)?,
        (TransportKind::Tcp, None) => bail!("--transport tcp requires --endpoints <FILE>"),
        (TransportKind::Broker, _) => FxHashMap::default(),
    };

    let transport = wiring::build_transport(opts.transport);

    let (channel_sink, rx) = ChannelReportSink::new(1024);
    let report: Box<dyn ReportSink> = Box::new(FanoutReportSink::new(vec![
        Arc::new(TracingReportSink),
        Arc::new(channel_sink),
    ]));
    // Nothing outside this process reads the channel half, but an unread
    // bounded channel still needs draining so it doesn't quietly start
    // dropping events once full.
    std::thread::spawn(move || while rx.recv().is_ok() {});

    let (mut coordinator, _cancel) =
        Coordinator::new(config, endpoints, transport, report).context("constructing coordinator")?;

    match coordinator.run() {
        FinishReason::Completed => {
            tracing::info!(t = coordinator.clock(), "run completed");
            Ok(())
        }
        FinishReason::Errored { kind, node, tick } => {
            bail!("run errored at t={tick}: {kind} (node={node:?})")
        }
    }
}
