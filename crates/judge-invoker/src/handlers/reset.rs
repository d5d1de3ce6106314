//! Reset operation handler.

use judge_protocol::ops::ResetResponse;
use judge_protocol::{RpcError, RpcRequest};

use super::to_payload;
use crate::invoker::Invoker;

/// Handle the reset operation: start a new epoch.
pub fn handle(_request: &RpcRequest, invoker: &Invoker) -> Result<serde_json::Value, RpcError> {
    to_payload(&ResetResponse { epoch: invoker.reset() })
}
