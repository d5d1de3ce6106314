//! Resource operation handler.
//!
//! Resolves an artifact to its local path, fetching it into the cache when
//! it is not resident.

use judge_protocol::ops::{names, ResourceRequest, ResourceResponse};
use judge_protocol::{ResourceKind, RpcError, RpcRequest};

use super::{parse, to_payload};
use crate::invoker::Invoker;
use crate::storage::FetchError;

/// Handle the resource operation.
pub fn handle(request: &RpcRequest, invoker: &Invoker) -> Result<serde_json::Value, RpcError> {
    let req: ResourceRequest = parse(request, names::RESOURCE)?;
    if !ResourceKind::CACHEABLE.contains(&req.resource) {
        return Err(RpcError::invalid_request(format!(
            "{} is not a cacheable resource",
            req.resource
        )));
    }

    let entry = invoker
        .storage()
        .get(req.resource, req.problem_id, req.submit_id, req.test_id)
        .map_err(|e| match e {
            FetchError::NotFound { resource } => {
                RpcError::resource_not_found(resource, req.problem_id, req.submit_id, req.test_id)
            }
            FetchError::Transport { resource, message } => RpcError::fetch_failed(resource, message),
        })?;

    to_payload(&ResourceResponse {
        path: entry.path.display().to_string(),
        size: entry.size,
    })
}
