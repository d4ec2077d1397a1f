//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (controller.rs):
//!     state check (state.rs) → resolve & load config → assemble container
//!     → container.start() → readiness.rs poll loop → Running / Failed
//!
//! Stop (controller.rs):
//!     detach container → container.stop() → errors become TeardownWarning
//!     → Stopped
//!
//! Server thread shutdown (shutdown.rs):
//!     container.stop() → broadcast → graceful drain → database flushed
//! ```
//!
//! # Design Decisions
//! - One container per controller; no globals
//! - Readiness is observed by polling, never awaited
//! - Stop is idempotent and never fails

pub mod controller;
pub mod handle;
pub mod readiness;
pub mod shutdown;
pub mod state;

pub use controller::LifecycleController;
pub use handle::DatabaseHandle;
pub use readiness::{Backoff, Interrupted, PollPolicy, Readiness, Sleeper, ThreadSleeper};
pub use shutdown::Shutdown;
pub use state::{ServerInstance, ServerState};
