//! Shipcheck - deployment target SSH verification
//!
//! Confirms a deployment target is reachable with the operator's key,
//! directly or through a jump host, and prepares the secrets a deployment
//! pipeline needs once it is.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod ssh;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `info` level. Output goes to stderr so
/// command output on stdout stays clean.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
