//! Metrics collection.
//!
//! # Responsibilities
//! - Record lifecycle outcomes of the graph server
//!
//! # Metrics
//! - `graph_server_starts_total` (counter): start attempts by outcome
//! - `graph_server_start_duration_seconds` (histogram): time spent in start()
//! - `graph_server_readiness_attempts` (histogram): waits before a definitive status
//! - `graph_server_teardown_warnings_total` (counter): failed container stops
//! - `graph_server_clean_runs_total` (counter): clean_db invocations
//! - `graph_server_cleaned_entities_total` (counter): entities removed, by kind
//! - `graph_server_running` (gauge): 1 while a server is running
//!
//! # Design Decisions
//! - No recorder is installed here; without one every call is a no-op

use metrics::{counter, gauge, histogram};
use std::time::Duration;

use crate::graph::CleanupSummary;

/// Records the outcome of a `start()` call ("ready", "failed", "timeout",
/// "configuration").
pub fn record_start(outcome: &'static str, duration: Duration) {
    counter!("graph_server_starts_total", "outcome" => outcome).increment(1);
    histogram!("graph_server_start_duration_seconds", "outcome" => outcome).record(duration.as_secs_f64());
}

pub fn record_readiness_attempts(attempts: u32) {
    histogram!("graph_server_readiness_attempts").record(f64::from(attempts));
}

pub fn record_teardown_warning() {
    counter!("graph_server_teardown_warnings_total").increment(1);
}

pub fn record_clean(summary: &CleanupSummary) {
    counter!("graph_server_clean_runs_total").increment(1);
    counter!("graph_server_cleaned_entities_total", "kind" => "node").increment(summary.nodes_deleted as u64);
    counter!("graph_server_cleaned_entities_total", "kind" => "relationship")
        .increment(summary.relationships_deleted as u64);
    counter!("graph_server_cleaned_entities_total", "kind" => "index").increment(summary.indexes_deleted as u64);
}

pub fn set_running(running: bool) {
    gauge!("graph_server_running").set(if running { 1.0 } else { 0.0 });
}
