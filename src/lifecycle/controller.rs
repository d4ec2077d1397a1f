//! Lifecycle controller.
//!
//! # Responsibilities
//! - Own at most one server container
//! - Start it from the current configuration and wait, bounded, for readiness
//! - Stop it idempotently, never propagating teardown errors
//! - Hand out the base URI and database while Running

use std::sync::Arc;
use std::time::Instant;
use url::Url;

use crate::config::{Endpoint, ServerConfig};
use crate::error::{HarnessError, TeardownWarning};
use crate::graph::{CleanupSummary, GraphDatabase};
use crate::lifecycle::handle::DatabaseHandle;
use crate::lifecycle::readiness::{wait_until_ready, Readiness};
use crate::lifecycle::state::{ServerInstance, ServerState};
use crate::observability::metrics;
use crate::server::ServerContainer;

/// Starts, polls, stops and exposes one graph server for a test suite.
///
/// Methods block the calling thread. Dropping a controller stops its server.
#[derive(Debug)]
pub struct LifecycleController {
    config: ServerConfig,
    instance: ServerInstance,
    last_teardown_warning: Option<TeardownWarning>,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl LifecycleController {
    pub fn new(config: ServerConfig) -> Self {
        let instance = ServerInstance::new(config.endpoint().clone());
        Self {
            config,
            instance,
            last_teardown_warning: None,
        }
    }

    /// Controller with default collaborators bound to `hostname:port`.
    pub fn with_endpoint(hostname: impl Into<String>, port: u16) -> Self {
        Self::new(ServerConfig::new(hostname, port))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        self.instance.state()
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.instance.endpoint()
    }

    pub fn hostname(&self) -> &str {
        self.instance.endpoint().hostname()
    }

    /// Configured port. With port 0 the bound port is in [`Self::base_uri`].
    pub fn port(&self) -> u16 {
        self.instance.endpoint().port()
    }

    pub fn has_container(&self) -> bool {
        self.instance.has_container()
    }

    /// Error raised by the most recent `stop()`, if it failed.
    pub fn last_teardown_warning(&self) -> Option<&TeardownWarning> {
        self.last_teardown_warning.as_ref()
    }

    /// Switch the configuration resource used by the next `start()`.
    pub fn set_configuration_resource(&mut self, name: impl Into<String>) -> Result<&mut Self, HarnessError> {
        self.require(ServerState::Stopped, "change the configuration resource")?;
        self.config.set_configuration_resource(name);
        Ok(self)
    }

    /// Start the server and block until it is ready, has failed, or the
    /// readiness budget is spent.
    pub fn start(&mut self) -> Result<(), HarnessError> {
        self.require(ServerState::Stopped, "start")?;

        let started_at = Instant::now();
        let result = self.start_inner();
        let outcome = match &result {
            Ok(()) => "ready",
            Err(HarnessError::Configuration(_)) => "configuration",
            Err(HarnessError::Timeout { .. }) => "timeout",
            Err(_) => "failed",
        };
        metrics::record_start(outcome, started_at.elapsed());
        metrics::set_running(self.state() == ServerState::Running);
        result
    }

    fn start_inner(&mut self) -> Result<(), HarnessError> {
        let endpoint = self.instance.endpoint().clone();
        tracing::info!(
            endpoint = %endpoint,
            resource = %self.config.configuration_resource(),
            "Starting graph server"
        );

        let properties = self.config.load_properties()?;

        let assembly = self.config.assembly(properties);
        let mut container = self
            .config
            .container_factory()
            .assemble(assembly)
            .map_err(|e| HarnessError::Startup {
                reason: format!("could not assemble server: {e}"),
            })?;

        if let Err(e) = container.start() {
            tracing::error!(endpoint = %endpoint, error = %e, "Graph server failed to start");
            self.instance.attach(container, ServerState::Failed);
            return Err(HarnessError::Startup {
                reason: e.to_string(),
            });
        }
        self.instance.attach(container, ServerState::Starting);

        let readiness = match self.instance.container() {
            Some(container) => wait_until_ready(self.config.poll_policy(), self.config.sleeper(), || {
                container.status()
            }),
            None => {
                return Err(HarnessError::Startup {
                    reason: "container released while starting".to_string(),
                })
            }
        };

        match readiness {
            Readiness::Ready { attempts } => {
                metrics::record_readiness_attempts(attempts);
                self.instance.transition(ServerState::Running);
                let base_uri = self.instance.container().and_then(|c| c.base_uri());
                tracing::info!(
                    endpoint = %endpoint,
                    base_uri = base_uri.as_ref().map(Url::as_str).unwrap_or(""),
                    attempts,
                    "Graph server started"
                );
                Ok(())
            }
            Readiness::Failed { attempts } => {
                metrics::record_readiness_attempts(attempts);
                self.instance.transition(ServerState::Failed);
                let reason = self
                    .instance
                    .container()
                    .and_then(|c| c.failure_reason())
                    .unwrap_or_else(|| "server reported failure while starting".to_string());
                tracing::error!(endpoint = %endpoint, attempts, reason = %reason, "Graph server failed to start");
                Err(HarnessError::Startup { reason })
            }
            Readiness::TimedOut { attempts, elapsed } => {
                metrics::record_readiness_attempts(attempts);
                self.instance.transition(ServerState::Failed);
                tracing::error!(
                    endpoint = %endpoint,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Graph server did not become ready"
                );
                Err(HarnessError::Timeout { attempts, elapsed })
            }
        }
    }

    /// Stop the server if one exists. Always ends Stopped; a failing
    /// container stop is logged and kept in [`Self::last_teardown_warning`].
    pub fn stop(&mut self) {
        let Some(mut container) = self.instance.detach() else {
            tracing::debug!(endpoint = %self.instance.endpoint(), "No graph server to stop");
            return;
        };

        tracing::info!(endpoint = %self.instance.endpoint(), "Stopping graph server");
        match container.stop() {
            Ok(()) => {
                self.last_teardown_warning = None;
                tracing::info!(endpoint = %self.instance.endpoint(), "Graph server stopped");
            }
            Err(e) => {
                let warning = TeardownWarning::from(e);
                tracing::warn!(endpoint = %self.instance.endpoint(), error = %warning, "Graph server stop failed");
                metrics::record_teardown_warning();
                self.last_teardown_warning = Some(warning);
            }
        }
        metrics::set_running(false);
    }

    /// Base URI of the running server.
    pub fn base_uri(&self) -> Result<Url, HarnessError> {
        let container = self.running_container("get the base URI")?;
        match container.base_uri() {
            Some(uri) => Ok(uri),
            None => self.instance.endpoint().base_url().map_err(|e| HarnessError::Startup {
                reason: format!("invalid endpoint {}: {e}", self.instance.endpoint()),
            }),
        }
    }

    /// Handle to the running server's database.
    pub fn database_handle(&self) -> Result<DatabaseHandle, HarnessError> {
        let graph = self.graph_database()?;
        let base_uri = self.base_uri()?;
        Ok(DatabaseHandle::new(graph, base_uri, self.config.cleaner().clone()))
    }

    /// The running server's database.
    pub fn graph_database(&self) -> Result<Arc<GraphDatabase>, HarnessError> {
        let container = self.running_container("access the database")?;
        container.database().ok_or_else(|| HarnessError::Startup {
            reason: "server has no database".to_string(),
        })
    }

    /// Wipe the running server's database.
    pub fn clean_db(&self) -> Result<CleanupSummary, HarnessError> {
        Ok(self.database_handle()?.clean_db())
    }

    fn require(&self, expected: ServerState, operation: &'static str) -> Result<(), HarnessError> {
        let state = self.instance.state();
        if state == expected {
            Ok(())
        } else {
            Err(HarnessError::IllegalState { operation, state })
        }
    }

    fn running_container(&self, operation: &'static str) -> Result<&dyn ServerContainer, HarnessError> {
        self.require(ServerState::Running, operation)?;
        self.instance.container().ok_or(HarnessError::IllegalState {
            operation,
            state: ServerState::Stopped,
        })
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if self.instance.has_container() {
            self.stop();
        }
    }
}
