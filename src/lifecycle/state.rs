//! Server instance state.
//!
//! # States
//! - Stopped: no container
//! - Starting: container started, readiness not yet observed
//! - Running: container reported started
//! - Failed: container failed or never became ready
//!
//! # State Transitions
//! ```text
//! Stopped → Starting → Running
//! Starting → Failed
//! any → Stopped (stop)
//! ```

use crate::config::Endpoint;
use crate::server::container::ServerContainer;

/// Lifecycle state of the controller's server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Failed,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerState::Stopped => write!(f, "stopped"),
            ServerState::Starting => write!(f, "starting"),
            ServerState::Running => write!(f, "running"),
            ServerState::Failed => write!(f, "failed"),
        }
    }
}

/// The one container a controller owns, with its state and endpoint.
pub struct ServerInstance {
    state: ServerState,
    endpoint: Endpoint,
    container: Option<Box<dyn ServerContainer>>,
}

impl std::fmt::Debug for ServerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerInstance")
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .field("has_container", &self.container.is_some())
            .finish()
    }
}

impl ServerInstance {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            state: ServerState::Stopped,
            endpoint,
            container: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn container(&self) -> Option<&dyn ServerContainer> {
        self.container.as_deref()
    }

    pub fn has_container(&self) -> bool {
        self.container.is_some()
    }

    pub(crate) fn transition(&mut self, to: ServerState) {
        if self.state != to {
            tracing::debug!(from = %self.state, to = %to, "Server state transition");
            self.state = to;
        }
    }

    /// Take ownership of a started container.
    pub(crate) fn attach(&mut self, container: Box<dyn ServerContainer>, state: ServerState) {
        self.container = Some(container);
        self.transition(state);
    }

    /// Release the container and return to Stopped.
    pub(crate) fn detach(&mut self) -> Option<Box<dyn ServerContainer>> {
        self.transition(ServerState::Stopped);
        self.container.take()
    }
}
