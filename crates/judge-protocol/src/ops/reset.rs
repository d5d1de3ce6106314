//! Reset operation types.

use serde::{Deserialize, Serialize};

/// Reset response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    /// Epoch in effect after the reset.
    pub epoch: String,
}
