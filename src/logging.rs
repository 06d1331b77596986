//! Diagnostic logging on standard error.
//!
//! Standard output is reserved for the recovery password, so the fmt layer
//! always writes to stderr. `RUST_LOG` takes precedence over the configured
//! verbosity when it is set.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::context::LogLevel;

/// Filter directive for a verbosity level.
pub fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Quiet => "off",
        LogLevel::Critical | LogLevel::Error => "error",
        LogLevel::Warning => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
    }
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
