//! # smn-cli::args
//!
//! The command-line surface, defined with `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "human")]
    pub log: LogFormat,

    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Address to serve Prometheus-format metrics on (e.g. 127.0.0.1:9000).
    /// Omit to skip installing the exporter.
    #[arg(long, global = true)]
    pub metrics_addr: Option<std::net::SocketAddr>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a coordinator from a system configuration file.
    Run(RunOpts),
    /// Validate a system configuration file without running it.
    Validate {
        #[arg(value_name = "CONFIG_PATH")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunOpts {
    /// Path to the system configuration file (TOML or YAML).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Which transport backend to drive the run over.
    #[arg(long, value_enum, default_value = "broker")]
    pub transport: TransportKind,

    /// Path to a node-name -> socket-address map (required for `--transport tcp`).
    #[arg(long)]
    pub endpoints: Option<PathBuf>,

    /// Overrides the configured `final_time`, in time atoms.
    #[arg(long)]
    pub stop_at: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Broker,
    Tcp,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}
