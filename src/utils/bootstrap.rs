//! Bootstrap utilities for processes embedding the event log.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the EVENTLOG_LOG environment variable.
///
/// Defaults to "info" level if EVENTLOG_LOG is not set. Later calls are
/// ignored once a global subscriber is installed, so tests may call this
/// freely.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
