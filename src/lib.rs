//! Symbolication of Apple crash reports against dSYM bundles.
//!
//! Symbol lookup itself is delegated to `atos` and `symbolicatecrash`; this crate finds
//! the inputs, drives the tools and splices their output back into the report.

pub mod address;
pub mod artifact;
pub mod batch;
pub mod config;
pub mod dsym;
pub mod error;
pub mod export;
pub mod images;
pub mod ips;
pub mod pipeline;
pub mod tool;

pub use error::{Error, Result};

use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber. `RUST_LOG` wins over the verbosity count.
pub fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
