//! In-process graph database server for integration tests.
//!
//! A [`LifecycleController`] starts an embedded web server fronting a fresh
//! graph database, waits a bounded time for it to become ready, and exposes
//! its base URI and database to the test until it is stopped.

pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod server;

pub use config::{Endpoint, ServerConfig};
pub use error::{HarnessError, TeardownWarning};
pub use graph::{CleanupSummary, GraphDatabase};
pub use lifecycle::{DatabaseHandle, LifecycleController, PollPolicy, ServerState};
