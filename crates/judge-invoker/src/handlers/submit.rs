//! Submit operation handler.
//!
//! Accepts a job assignment from the master.

use judge_protocol::ops::{names, SubmitRequest, SubmitResponse};
use judge_protocol::{RpcError, RpcRequest};

use super::{parse, to_payload};
use crate::invoker::Invoker;
use crate::jobs::JobError;

/// Handle the submit operation.
pub fn handle(request: &RpcRequest, invoker: &Invoker) -> Result<serde_json::Value, RpcError> {
    let req: SubmitRequest = parse(request, names::SUBMIT)?;
    if req.job.id.is_empty() {
        return Err(RpcError::invalid_request("job id must not be empty"));
    }

    let job_id = req.job.id.clone();
    let admission = invoker.jobs().accept(req.job).map_err(|e| match e {
        JobError::Duplicate(id) => RpcError::duplicate_job(&id),
        JobError::NoCapacity { capacity } => RpcError::busy(capacity),
        JobError::NotFound(id) => RpcError::job_not_found(&id),
        JobError::RequirementFailed { job, required } => RpcError::requirement_failed(&job, &required),
    })?;

    to_payload(&SubmitResponse {
        job_id,
        epoch: invoker.storage().epoch().label(admission.epoch),
        runnable: admission.runnable,
    })
}
