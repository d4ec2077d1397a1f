//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Controller, container and REST handlers produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout, or the libtest capture buffer in tests
//!     → whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (endpoint, attempts, error)
//! - No exporter is installed; the metrics facade is a no-op without one
//! - Subscriber initialisation tolerates an already-installed subscriber

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_test_logging};
