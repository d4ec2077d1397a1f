//! Bounded readiness polling.
//!
//! # Responsibilities
//! - Poll a container's status until it is definitive or the budget runs out
//! - Wait between polls through an injectable [`Sleeper`]
//!
//! # Design Decisions
//! - The budget counts waits, not checks: with 6 attempts at 500 ms the
//!   status is checked 7 times over ~3 s
//! - An interrupted wait is logged and still consumes its attempt
//! - Blocking by contract; callers are plain test threads

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::resilience::backoff::calculate_backoff;
use crate::server::container::ContainerStatus;

/// Default wait between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of waits before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// How the wait grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Every wait is `interval`.
    Fixed,
    /// `interval * 2^(attempt-1)` capped at `max_interval`, plus jitter.
    Exponential { max_interval: Duration },
}

/// Interval and attempt budget of the readiness loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Wait before the 1-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { max_interval } => calculate_backoff(attempt, self.interval, max_interval),
        }
    }
}

/// A wait cut short by the host environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("wait interrupted: {reason}")]
pub struct Interrupted {
    pub reason: String,
}

/// Blocks the calling thread between readiness checks.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted>;
}

/// Sleeps the current thread. Never interrupted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        std::thread::sleep(duration);
        Ok(())
    }
}

/// Outcome of the readiness loop. `attempts` is the number of waits spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { attempts: u32 },
    Failed { attempts: u32 },
    TimedOut { attempts: u32, elapsed: Duration },
}

/// Poll `status` until it reports `Started` or `Failed`, or the policy's
/// attempt budget is spent.
pub fn wait_until_ready<F>(policy: &PollPolicy, sleeper: &dyn Sleeper, mut status: F) -> Readiness
where
    F: FnMut() -> ContainerStatus,
{
    let started_at = Instant::now();
    let mut attempts = 0;

    loop {
        let current = status();
        tracing::debug!(status = %current, attempts, "Graph server status");

        match current {
            ContainerStatus::Started => return Readiness::Ready { attempts },
            ContainerStatus::Failed => return Readiness::Failed { attempts },
            ContainerStatus::Starting | ContainerStatus::Stopped => {}
        }

        if attempts >= policy.max_attempts {
            return Readiness::TimedOut {
                attempts,
                elapsed: started_at.elapsed(),
            };
        }

        attempts += 1;
        let delay = policy.delay_for(attempts);
        if let Err(e) = sleeper.sleep(delay) {
            tracing::warn!(attempt = attempts, error = %e, "Readiness wait interrupted, polling continues");
        }
    }
}
