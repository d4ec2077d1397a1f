//! Container abstraction.
//!
//! The lifecycle controller only ever talks to a [`ServerContainer`] it got
//! from a [`ContainerFactory`]. The embedded axum server is the default
//! implementation; tests substitute scripted containers to drive the
//! readiness loop.

use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::config::schema::ServerProperties;
use crate::config::Endpoint;
use crate::graph::{GraphDatabase, GraphError, StorageFactory};
use crate::server::address::AddressResolver;
use crate::server::health::HealthCheckSet;
use crate::server::modules::ModuleSet;

/// Status reported by a container while it starts asynchronously.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Stopped = 0,
    Starting = 1,
    Started = 2,
    Failed = 3,
}

impl From<u8> for ContainerStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => ContainerStatus::Starting,
            2 => ContainerStatus::Started,
            3 => ContainerStatus::Failed,
            _ => ContainerStatus::Stopped,
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerStatus::Stopped => write!(f, "STOPPED"),
            ContainerStatus::Starting => write!(f, "STARTING"),
            ContainerStatus::Started => write!(f, "STARTED"),
            ContainerStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Errors raised by a container while assembling, starting or stopping.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// A startup health check rule rejected the configuration.
    #[error("Startup health check '{rule}' failed: {reason}")]
    HealthCheck { rule: String, reason: String },

    /// The storage factory could not provide a database.
    #[error("Storage error: {0}")]
    Storage(#[from] GraphError),

    /// A server module could not be mounted.
    #[error("Module '{module}' rejected: {reason}")]
    Module { module: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The server thread panicked.
    #[error("Server worker panicked")]
    WorkerPanicked,

    /// `start` called on a container that was already started.
    #[error("Container already started")]
    AlreadyStarted,

    /// Any other container-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Everything a container needs, produced by `ServerConfig`.
#[derive(Clone)]
pub struct ContainerAssembly {
    /// Endpoint the container binds to.
    pub endpoint: Endpoint,
    /// Properties loaded from the configuration resource.
    pub properties: ServerProperties,
    pub storage: Arc<dyn StorageFactory>,
    pub address_resolver: Arc<dyn AddressResolver>,
    pub health_checks: HealthCheckSet,
    pub modules: ModuleSet,
}

impl std::fmt::Debug for ContainerAssembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerAssembly")
            .field("endpoint", &self.endpoint)
            .field("properties", &self.properties)
            .field("storage", &self.storage.kind())
            .field("hostname", &self.address_resolver.hostname())
            .field("health_checks", &self.health_checks)
            .field("modules", &self.modules)
            .finish()
    }
}

/// A web container fronting a graph database.
pub trait ServerContainer: Send {
    /// Begin starting. Must not block until the server is ready; progress is
    /// observed through [`ServerContainer::status`].
    fn start(&mut self) -> Result<(), ContainerError>;

    fn status(&self) -> ContainerStatus;

    /// Human-readable cause when [`ServerContainer::status`] is `Failed`.
    fn failure_reason(&self) -> Option<String> {
        None
    }

    /// Stop the container and release its resources.
    fn stop(&mut self) -> Result<(), ContainerError>;

    /// The database fronted by this container, once created.
    fn database(&self) -> Option<Arc<GraphDatabase>>;

    /// Base URI, once the container is bound.
    fn base_uri(&self) -> Option<Url>;
}

/// Builds a container from its collaborators.
pub trait ContainerFactory: Send + Sync {
    fn assemble(&self, assembly: ContainerAssembly) -> Result<Box<dyn ServerContainer>, ContainerError>;
}
