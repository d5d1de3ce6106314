//! Resource operation types.
//!
//! Resolve an artifact to a local path, fetching it into the cache on a miss.

use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;

/// Resource request payload.
///
/// `submit_id` is only read for submission-scoped kinds and `test_id` only for
/// test-scoped kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub resource: ResourceKind,
    #[serde(default)]
    pub problem_id: u64,
    #[serde(default)]
    pub submit_id: u64,
    #[serde(default)]
    pub test_id: u64,
}

/// Resource response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResponse {
    /// Absolute path of the cached artifact.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}
