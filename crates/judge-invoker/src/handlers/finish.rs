//! Finish operation handler.
//!
//! Records the outcome the execution engine reported for a job.

use judge_protocol::ops::{names, FinishRequest, FinishResponse};
use judge_protocol::{RpcError, RpcRequest};

use super::{parse, to_payload};
use crate::invoker::Invoker;

/// Handle the finish operation.
pub fn handle(request: &RpcRequest, invoker: &Invoker) -> Result<serde_json::Value, RpcError> {
    let req: FinishRequest = parse(request, names::FINISH)?;

    let outcome = invoker
        .jobs()
        .finish(&req.job_id, req.success)
        .map_err(|_| RpcError::job_not_found(&req.job_id))?;

    to_payload(&FinishResponse {
        job_id: req.job_id,
        runnable: outcome.runnable,
        cancelled: outcome.cancelled,
    })
}
