//! Tracing subscriber setup.
//!
//! The library itself only emits `tracing` events; binaries call [`init`] once
//! at startup. `RUST_LOG` wins over the configured level when set.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter used by [`init`].
///
/// `verbose` raises this crate to `debug` without touching other targets.
pub fn filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    let directive = if verbose {
        format!("threadsafe_serial=debug,{}", config.level)
    } else {
        config.level.clone()
    };

    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, writing to stderr.
///
/// Returns `false` if a subscriber was already installed.
pub fn init(config: &LoggingConfig, verbose: bool) -> bool {
    let registry = tracing_subscriber::registry().with(filter(config, verbose));
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true);

    let result = match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry
            .with(layer.with_target(false).compact())
            .try_init(),
    };
    result.is_ok()
}
