//! Log output for binaries.
//!
//! Libraries only emit `tracing` events; installing a subscriber is the
//! application's call. This wires up the usual one: human-readable lines
//! on stderr, filtered by `RUST_LOG` when it is set.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Installs a global subscriber with the default filter.
///
/// Calling it twice is harmless; the second call does nothing.
pub fn init() {
    init_with(DEFAULT_FILTER);
}

/// Installs a global subscriber, falling back to `default_filter`
/// (e.g. `"multiplay=debug,info"`) when `RUST_LOG` is unset.
pub fn init_with(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
