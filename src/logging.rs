//! Diagnostic logging setup
//!
//! Library code logs through `tracing` macros; the binary installs one fmt
//! subscriber on stderr. `AQSTORE_LOG` takes an `EnvFilter` directive and
//! overrides the level derived from `-v`/`-q`.

use anyhow::{anyhow, Result};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "AQSTORE_LOG";

/// Filter directive for the given verbosity flags
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub fn build_filter(verbose: u8, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(verbose: u8, quiet: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose, quiet))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
