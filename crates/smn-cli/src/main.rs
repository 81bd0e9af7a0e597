//! # smn-cli
//!
//! The command-line entry point for the System Management Node: parses
//! arguments, initializes logging, and dispatches to a subcommand.

#![forbid(unsafe_code)]

use crate::args::{Cli, Command};
use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;

mod args;
mod commands;
mod logging;
mod wiring;

fn main() -> Result<()> {
    let args = Cli::parse();
    logging::init(args.log, args.log_file.as_deref())?;

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing the Prometheus metrics exporter")?;
        tracing::info!(%addr, "serving Prometheus metrics");
    }

    match args.command {
        Command::Run(opts) => commands::run::exec(opts),
        Command::Validate { config } => commands::validate::exec(config),
    }
}
