//! Subscriber installation.

use tracing_subscriber::EnvFilter;

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Installs a human-readable fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive` (e.g. `"stepflow=debug"`).
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Installs a JSON fmt subscriber, one object per event.
///
/// Returns false if a global subscriber was already installed.
pub fn init_json_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_directive))
        .with_current_span(true)
        .try_init()
        .is_ok()
}
