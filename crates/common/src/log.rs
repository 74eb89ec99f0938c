//! Logging channels.
//!
//! Two `tracing` targets split engine diagnostics from application output:
//! [`CORE`] for the engine crates and [`CLIENT`] for code built on top of them.
//! Filter them independently, e.g. `RUST_LOG=lumen::core=trace,lumen::client=info`.

use tracing_subscriber::EnvFilter;

/// Target for engine-internal diagnostics (shader compilation, registry, file IO).
pub const CORE: &str = "lumen::core";

/// Target for application-level messages.
pub const CLIENT: &str = "lumen::client";

/// Default filter directive for the given verbosity.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity flag when set. Calling this
/// more than once is harmless: later calls leave the first subscriber in place.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
    {
        tracing::debug!(target: CORE, "logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_distinct() {
        assert_ne!(CORE, CLIENT);
        assert!(CORE.starts_with("lumen::"));
        assert!(CLIENT.starts_with("lumen::"));
    }

    #[test]
    fn verbosity_selects_filter() {
        assert_eq!(default_filter(true), "debug");
        assert_eq!(default_filter(false), "info");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(false);
        init(true);
    }
}
