//! Error types for the RPC protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resource::ResourceKind;

/// Error codes returned in RPC error responses.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed JSON, missing required fields, or invalid field values.
    InvalidRequest,
    /// Protocol version is outside the supported range.
    UnsupportedProtocol,
    /// Unknown operation requested.
    UnknownOperation,
    /// Invoker has no room for another job.
    Busy,
    /// Job not found.
    JobNotFound,
    /// A job with this ID is already active.
    DuplicateJob,
    /// Storage has no such artifact.
    ResourceNotFound,
    /// Fetching the artifact from storage failed.
    FetchFailed,
    /// A job this one requires already failed on the invoker.
    RequirementFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::UnsupportedProtocol => write!(f, "UNSUPPORTED_PROTOCOL"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
            Self::Busy => write!(f, "BUSY"),
            Self::JobNotFound => write!(f, "JOB_NOT_FOUND"),
            Self::DuplicateJob => write!(f, "DUPLICATE_JOB"),
            Self::ResourceNotFound => write!(f, "RESOURCE_NOT_FOUND"),
            Self::FetchFailed => write!(f, "FETCH_FAILED"),
            Self::RequirementFailed => write!(f, "REQUIREMENT_FAILED"),
        }
    }
}

/// RPC error response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Create a new RPC error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new RPC error with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create an UNSUPPORTED_PROTOCOL error.
    pub fn unsupported_protocol(version: i32, min: i32, max: i32) -> Self {
        Self::with_data(
            ErrorCode::UnsupportedProtocol,
            format!("protocol_version {} is outside supported range [{}, {}]", version, min, max),
            serde_json::json!({
                "requested": version,
                "min": min,
                "max": max
            }),
        )
    }

    /// Create an UNKNOWN_OPERATION error.
    pub fn unknown_operation(op: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownOperation,
            format!("unknown operation: {}", op),
            serde_json::json!({ "op": op }),
        )
    }

    /// Create a BUSY error carrying the invoker's capacity.
    pub fn busy(capacity: usize) -> Self {
        Self::with_data(
            ErrorCode::Busy,
            format!("invoker is at capacity ({} jobs)", capacity),
            serde_json::json!({ "capacity": capacity }),
        )
    }

    /// Create a JOB_NOT_FOUND error.
    pub fn job_not_found(job_id: &str) -> Self {
        Self::with_data(
            ErrorCode::JobNotFound,
            format!("job '{}' not found", job_id),
            serde_json::json!({ "job_id": job_id }),
        )
    }

    /// Create a DUPLICATE_JOB error.
    pub fn duplicate_job(job_id: &str) -> Self {
        Self::with_data(
            ErrorCode::DuplicateJob,
            format!("job '{}' is already active", job_id),
            serde_json::json!({ "job_id": job_id }),
        )
    }

    /// Create a RESOURCE_NOT_FOUND error.
    pub fn resource_not_found(kind: ResourceKind, problem_id: u64, submit_id: u64, test_id: u64) -> Self {
        Self::with_data(
            ErrorCode::ResourceNotFound,
            format!("{} does not exist in storage", kind),
            serde_json::json!({
                "resource": kind,
                "problem_id": problem_id,
                "submit_id": submit_id,
                "test_id": test_id
            }),
        )
    }

    /// Create a REQUIREMENT_FAILED error.
    pub fn requirement_failed(job_id: &str, required: &str) -> Self {
        Self::with_data(
            ErrorCode::RequirementFailed,
            format!("job '{}' requires '{}', which failed", job_id, required),
            serde_json::json!({ "job_id": job_id, "required_job_id": required }),
        )
    }

    /// Create a FETCH_FAILED error.
    pub fn fetch_failed(kind: ResourceKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_data(
            ErrorCode::FetchFailed,
            format!("failed to fetch {}: {}", kind, message),
            serde_json::json!({ "resource": kind }),
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
