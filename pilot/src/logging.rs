//! Development-time tracing for debugging the robot runtime.
//!
//! Diagnostics only: controlled via `RUST_LOG`, written to stderr. The
//! product output of a run (status lines, verdict files) goes through
//! stdout and the plan store, unaffected by this filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for a CLI invocation.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Output: stderr, compact
/// format.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
