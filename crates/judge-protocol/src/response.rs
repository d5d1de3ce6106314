//! RPC response envelope.
//!
//! The invoker answers every request line with exactly one response line,
//! in request order. A line that is not a valid request still gets an
//! answer: an `INVALID_REQUEST` error with protocol version 0 and an empty
//! request id, since neither could be read.

use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// Protocol version echoed when the request could not be parsed.
pub const UNPARSED_PROTOCOL_VERSION: i32 = 0;

/// One response line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub protocol_version: i32,
    pub request_id: String,
    pub ok: bool,
    /// Operation payload, set when `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Set when not `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(protocol_version: i32, request_id: String, payload: serde_json::Value) -> Self {
        Self {
            protocol_version,
            request_id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(protocol_version: i32, request_id: String, error: RpcError) -> Self {
        Self {
            protocol_version,
            request_id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Answer to a line that did not parse as a request.
    pub fn unparsed(error: RpcError) -> Self {
        Self::error(UNPARSED_PROTOCOL_VERSION, String::new(), error)
    }

    /// Payload on success, error otherwise. A success without payload reads
    /// as `null`; a failure without error details reads as `INVALID_REQUEST`.
    pub fn into_result(self) -> Result<serde_json::Value, RpcError> {
        if self.ok {
            Ok(self.payload.unwrap_or(serde_json::Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| RpcError::invalid_request("error response without details")))
        }
    }
}
