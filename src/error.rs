//! Harness-level errors.

use std::time::Duration;
use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::lifecycle::state::ServerState;
use crate::server::container::ContainerError;

/// Errors surfaced by the lifecycle controller.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The configuration resource is missing, unreadable or invalid.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The operation is not allowed in the current state.
    #[error("Cannot {operation} while server is {state}")]
    IllegalState {
        operation: &'static str,
        state: ServerState,
    },

    /// The container could not be assembled or started, or reported failure
    /// while starting.
    #[error("Graph server startup failed: {reason}")]
    Startup { reason: String },

    /// No definitive status within the readiness budget.
    #[error("Graph server not ready after {attempts} attempts ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },
}

/// An error raised while stopping the container.
///
/// `stop()` logs and records it but never returns it.
#[derive(Debug, Error)]
#[error("Error stopping graph server: {source}")]
pub struct TeardownWarning {
    #[from]
    pub source: ContainerError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_messages() {
        let err = HarnessError::IllegalState {
            operation: "start",
            state: ServerState::Running,
        };
        assert_eq!(err.to_string(), "Cannot start while server is running");

        let err = HarnessError::from(ConfigError::NotFound {
            name: "x.toml".into(),
            searched: vec![PathBuf::from(".")],
        });
        assert!(err.to_string().starts_with("Configuration error: Could not resolve"));

        let warning = TeardownWarning::from(ContainerError::WorkerPanicked);
        assert_eq!(warning.to_string(), "Error stopping graph server: Server worker panicked");
    }
}
