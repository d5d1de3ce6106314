//! Finish operation types.
//!
//! Reported by the execution engine when a job completes.

use serde::{Deserialize, Serialize};

/// Finish request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishRequest {
    pub job_id: String,
    pub success: bool,
}

/// Finish response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishResponse {
    pub job_id: String,
    /// Active jobs whose requirements are now all satisfied.
    pub runnable: Vec<String>,
    /// Active jobs dropped because a job they required failed.
    #[serde(default)]
    pub cancelled: Vec<String>,
}
