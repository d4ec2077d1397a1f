//! Embedded web server.
//!
//! # Responsibilities
//! - Run startup health checks and create the database
//! - Build the Axum router from the module set, with middleware
//!   (tracing, timeout, body limit, request ID)
//! - Bind and serve on a dedicated thread owning its own tokio runtime
//! - Publish progress through an atomic status the controller polls
//! - Graceful shutdown on request, database flushed afterwards

use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::schema::WebConfig;
use crate::config::Endpoint;
use crate::graph::GraphDatabase;
use crate::lifecycle::shutdown::{signalled, Shutdown};
use crate::server::container::{
    ContainerAssembly, ContainerError, ContainerFactory, ContainerStatus, ServerContainer,
};
use crate::server::modules::ModuleContext;

/// Produces [`EmbeddedWebServer`] containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedContainerFactory;

impl ContainerFactory for EmbeddedContainerFactory {
    fn assemble(&self, assembly: ContainerAssembly) -> Result<Box<dyn ServerContainer>, ContainerError> {
        Ok(Box::new(EmbeddedWebServer::new(assembly)))
    }
}

/// In-process Axum server fronting a graph database.
pub struct EmbeddedWebServer {
    assembly: ContainerAssembly,
    hostname: String,
    status: Arc<AtomicU8>,
    bound: Arc<OnceLock<SocketAddr>>,
    failure: Arc<OnceLock<String>>,
    shutdown: Shutdown,
    database: Option<Arc<GraphDatabase>>,
    worker: Option<JoinHandle<Result<(), ContainerError>>>,
}

impl EmbeddedWebServer {
    pub fn new(assembly: ContainerAssembly) -> Self {
        let hostname = assembly.address_resolver.hostname();
        Self {
            assembly,
            hostname,
            status: Arc::new(AtomicU8::new(ContainerStatus::Stopped as u8)),
            bound: Arc::new(OnceLock::new()),
            failure: Arc::new(OnceLock::new()),
            shutdown: Shutdown::new(),
            database: None,
            worker: None,
        }
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }

    fn set_status(&self, status: ContainerStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    /// Wrap the module routes with the server-wide middleware stack.
    #[allow(deprecated)]
    fn build_router(&self, ctx: &ModuleContext) -> Result<Router, ContainerError> {
        let web: &WebConfig = &self.assembly.properties.web;
        let router = self.assembly.modules.build_router(ctx)?;
        Ok(router
            .layer(RequestBodyLimitLayer::new(web.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(web.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http()))
    }
}

impl ServerContainer for EmbeddedWebServer {
    fn start(&mut self) -> Result<(), ContainerError> {
        if self.worker.is_some() {
            return Err(ContainerError::AlreadyStarted);
        }

        let props = self.assembly.properties.clone();
        self.assembly.health_checks.run(&props)?;

        let database = self
            .assembly
            .storage
            .create_database(&props.database.location, &props.database.properties)?;
        self.database = Some(database.clone());

        let worker_threads = props.web.worker_threads;
        let ctx = ModuleContext {
            database,
            properties: props,
        };
        let app = self.build_router(&ctx)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("graph-test-server-worker")
            .enable_all()
            .build()?;

        let task = ServeTask {
            app,
            hostname: self.hostname.clone(),
            port: self.assembly.endpoint.port(),
            status: self.status.clone(),
            bound: self.bound.clone(),
            failure: self.failure.clone(),
            shutdown: self.shutdown.subscribe(),
        };

        self.set_status(ContainerStatus::Starting);
        let worker = thread::Builder::new()
            .name("graph-test-server".to_string())
            .spawn(move || runtime.block_on(task.run()));

        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.set_status(ContainerStatus::Failed);
                Err(ContainerError::Io(e))
            }
        }
    }

    fn status(&self) -> ContainerStatus {
        ContainerStatus::from(self.status.load(Ordering::SeqCst))
    }

    fn failure_reason(&self) -> Option<String> {
        self.failure.get().cloned()
    }

    fn stop(&mut self) -> Result<(), ContainerError> {
        self.shutdown.trigger();

        let mut result = Ok(());
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => result = Err(e),
                Err(_) => result = Err(ContainerError::WorkerPanicked),
            }
        }

        if let Some(database) = self.database.take() {
            if let Err(e) = database.shutdown() {
                tracing::error!(error = %e, "Failed to shut down graph database");
                if result.is_ok() {
                    result = Err(e.into());
                }
            }
        }

        self.set_status(ContainerStatus::Stopped);
        result
    }

    fn database(&self) -> Option<Arc<GraphDatabase>> {
        self.database.clone()
    }

    fn base_uri(&self) -> Option<Url> {
        let addr = self.bound.get()?;
        Endpoint::new(self.hostname.as_str(), addr.port()).base_url().ok()
    }
}

impl Drop for EmbeddedWebServer {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!(error = %e, "Error stopping dropped embedded server");
            }
        }
    }
}

/// State moved onto the server thread.
struct ServeTask {
    app: Router,
    hostname: String,
    port: u16,
    status: Arc<AtomicU8>,
    bound: Arc<OnceLock<SocketAddr>>,
    failure: Arc<OnceLock<String>>,
    shutdown: broadcast::Receiver<()>,
}

impl ServeTask {
    async fn run(self) -> Result<(), ContainerError> {
        let ServeTask {
            app,
            hostname,
            port,
            status,
            bound,
            failure,
            shutdown,
        } = self;

        let fail = |reason: String| {
            tracing::error!(reason = %reason, "Embedded web server failed");
            let _ = failure.set(reason);
            status.store(ContainerStatus::Failed as u8, Ordering::SeqCst);
        };

        let listener = match TcpListener::bind((hostname.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) => {
                // Reported through the status; the controller raises it.
                fail(format!("Failed to bind {}:{}: {}", hostname, port, e));
                return Ok(());
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                fail(format!("Failed to read bound address: {e}"));
                return Ok(());
            }
        };

        let _ = bound.set(addr);
        status.store(ContainerStatus::Started as u8, Ordering::SeqCst);
        tracing::info!(address = %addr, hostname = %hostname, "Embedded web server started");

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(signalled(shutdown))
            .await;

        match served {
            Ok(()) => {
                status.store(ContainerStatus::Stopped as u8, Ordering::SeqCst);
                tracing::info!(address = %addr, "Embedded web server stopped");
                Ok(())
            }
            Err(e) => {
                fail(format!("Server error: {e}"));
                Err(ContainerError::Io(e))
            }
        }
    }
}
