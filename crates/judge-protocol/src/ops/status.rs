//! Invoker status report.
//!
//! The master reads `epoch` to fence work: any job it dispatched under a
//! different epoch is lost and must be rescheduled.

use serde::{Deserialize, Serialize};

/// Status request payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusRequest {
    /// Include runtime metrics in the response.
    #[serde(default)]
    pub include_metrics: bool,
}

/// Snapshot reported by an invoker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokerStatus {
    /// How many more jobs the invoker is willing to accept right now.
    pub max_new_jobs: usize,
    /// Jobs currently held by the invoker.
    pub active_job_ids: Vec<String>,
    /// Opaque epoch identity; changes on every reset and every restart.
    pub epoch: String,
    /// Network address of the invoker.
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<StatusMetrics>,
}

/// Optional runtime metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMetrics {
    /// Time since the invoker process started.
    pub lifetime_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_metrics: Option<StatusThreadsMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_metrics: Option<StatusThreadsMetrics>,
}

/// Accumulated wait time per slot of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusThreadsMetrics {
    pub count: usize,
    pub total_wait_ms: Vec<u64>,
}
