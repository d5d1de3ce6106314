//! Operation handlers for the invoker RPC.
//!
//! Each handler parses its payload, acts on the shared [`Invoker`] and
//! returns the response payload.
//!
//! [`Invoker`]: crate::invoker::Invoker

pub mod finish;
pub mod reset;
pub mod resource;
pub mod status;
pub mod submit;

use judge_protocol::{RpcError, RpcRequest};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Decode the request payload for `op`.
pub(crate) fn parse<T: DeserializeOwned>(request: &RpcRequest, op: &str) -> Result<T, RpcError> {
    serde_json::from_value(request.payload.clone())
        .map_err(|e| RpcError::invalid_request(format!("invalid {} request: {}", op, e)))
}

pub(crate) fn to_payload<T: Serialize>(response: &T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(response)
        .map_err(|e| RpcError::invalid_request(format!("failed to serialize response: {}", e)))
}
