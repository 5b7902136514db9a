//! Tracing setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber with `RUST_LOG` taking precedence over
/// the configured filter. Safe to call more than once; later calls are
/// no-ops.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
