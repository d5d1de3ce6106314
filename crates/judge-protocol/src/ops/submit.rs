//! Submit operation types.
//!
//! Job assignment from master to invoker.

use serde::{Deserialize, Serialize};

use super::job::Job;

/// Submit request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub job: Job,
}

/// Submit response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// The job ID (echoed).
    pub job_id: String,
    /// Epoch the job was accepted under.
    pub epoch: String,
    /// Whether all required jobs already succeeded on this invoker.
    pub runnable: bool,
}
