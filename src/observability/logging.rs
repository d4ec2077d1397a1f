//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binary and for tests
//! - Configure log level at runtime through `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the default directive
//! - Tests log through the libtest writer so output stays per-test

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "graph_test_server=info,tower_http=info";

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Install a subscriber writing through the test harness. Safe to call from
/// every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "graph_test_server=debug".into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test_logging();
        init_test_logging();
        assert!(!init_logging(DEFAULT_DIRECTIVE));
    }
}
