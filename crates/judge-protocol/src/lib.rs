//! Judge Protocol Types
//!
//! Wire types exchanged between the master and invokers: job assignments,
//! invoker status reports, resource kinds, and the JSON RPC envelope the
//! invoker speaks on stdin/stdout.

pub mod error;
pub mod ops;
pub mod request;
pub mod resource;
pub mod response;

pub use error::{ErrorCode, RpcError};
pub use ops::{InvokerStatus, Job, JobType, StatusMetrics, StatusThreadsMetrics};
pub use request::RpcRequest;
pub use resource::ResourceKind;
pub use response::{RpcResponse, UNPARSED_PROTOCOL_VERSION};

/// Minimum protocol version supported by this implementation.
pub const PROTOCOL_MIN: i32 = 1;

/// Maximum protocol version supported by this implementation.
pub const PROTOCOL_MAX: i32 = 1;
