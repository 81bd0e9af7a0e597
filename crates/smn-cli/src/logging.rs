//! # smn-cli::logging
//!
//! Initializes the `tracing` subscriber the rest of the binary logs
//! through. `Human` uses the stock compact formatter; `Json` emits one
//! structured line per event, for shipping to a log aggregator.

use crate::args::LogFormat;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Call once, before anything else logs.
pub fn init(format: LogFormat, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (format, log_file) {
        (LogFormat::Json, Some(path)) => {
            let file = std::fs::File::create(path)?;
            builder.json().with_writer(file).init();
        }
        (LogFormat::Json, None) => {
            builder.json().init();
        }
        (LogFormat::Human, Some(path)) => {
            let file = std::fs::File::create(path)?;
            builder.with_writer(file).with_ansi(false).init();
        }
        (LogFormat::Human, None) => {
            builder.init();
        }
    }
    Ok(())
}
