//! Resilience helpers.
//!
//! # Design Decisions
//! - Backoff is opt-in for readiness polling; the default interval is fixed
//! - Jitter only ever lengthens a delay, never shortens it

pub mod backoff;

pub use backoff::calculate_backoff;
