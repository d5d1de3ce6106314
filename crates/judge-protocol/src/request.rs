//! RPC request types.

use serde::{Deserialize, Serialize};

/// RPC request envelope.
///
/// The invoker reads one request per line on stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version chosen by the master.
    pub protocol_version: i32,
    /// Operation name.
    pub op: String,
    /// Caller-chosen request ID for correlation.
    pub request_id: String,
    /// Operation-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RpcRequest {
    /// Build a request for `op` with the given payload at the current protocol version.
    pub fn new(op: impl Into<String>, request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_MAX,
            op: op.into(),
            request_id: request_id.into(),
            payload,
        }
    }
}
