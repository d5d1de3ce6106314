//! Status operation handler.
//!
//! Reports capacity, active jobs and the current epoch to the master.

use judge_protocol::ops::{names, StatusRequest};
use judge_protocol::{RpcError, RpcRequest};

use super::{parse, to_payload};
use crate::invoker::Invoker;

/// Handle the status operation. An empty payload means no metrics.
pub fn handle(request: &RpcRequest, invoker: &Invoker) -> Result<serde_json::Value, RpcError> {
    let req: StatusRequest = if request.payload.is_null() {
        StatusRequest::default()
    } else {
        parse(request, names::STATUS)?
    };
    to_payload(&invoker.status(req.include_metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::test_support::invoker;
    use judge_protocol::{InvokerStatus, Job};

    #[test]
    fn test_status_lists_jobs_and_epoch() {
        let (_temp, _remote, invoker) = invoker(2);
        invoker.jobs().accept(Job::compile("c-1", 1)).unwrap();

        let request = RpcRequest::new("status", "test-001", serde_json::json!({}));
        let status: InvokerStatus = serde_json::from_value(handle(&request, &invoker).unwrap()).unwrap();

        assert_eq!(status.active_job_ids, vec!["c-1"]);
        assert_eq!(status.max_new_jobs, 1);
        assert_eq!(status.epoch, "inv-0");
        assert!(status.metrics.is_none());
    }

    #[test]
    fn test_status_null_payload_and_metrics() {
        let (_temp, _remote, invoker) = invoker(2);

        let request = RpcRequest::new("status", "test-002", serde_json::Value::Null);
        assert!(handle(&request, &invoker).is_ok());

        let request = RpcRequest::new("status", "test-003", serde_json::json!({ "include_metrics": true }));
        let status: InvokerStatus = serde_json::from_value(handle(&request, &invoker).unwrap()).unwrap();
        assert!(status.metrics.is_some());
    }
}
