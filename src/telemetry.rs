//! Logging setup for the binary.
//!
//! Priority: `RUST_LOG` > `--verbose` (debug) > default `info`. Output goes
//! to stderr so stdout stays clean for command results.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber. Later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let default_filter = format!("warn,omnitech_agent={level}");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose),
        )
        .try_init()
        .ok();
}
