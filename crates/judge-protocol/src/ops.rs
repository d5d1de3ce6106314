//! Operation-specific types.

pub mod finish;
pub mod job;
pub mod reset;
pub mod resource;
pub mod status;
pub mod submit;

pub use finish::{FinishRequest, FinishResponse};
pub use job::{Job, JobType};
pub use reset::ResetResponse;
pub use resource::{ResourceRequest, ResourceResponse};
pub use status::{InvokerStatus, StatusMetrics, StatusRequest, StatusThreadsMetrics};
pub use submit::{SubmitRequest, SubmitResponse};

/// Known operation names.
pub mod names {
    pub const STATUS: &str = "status";
    pub const SUBMIT: &str = "submit";
    pub const FINISH: &str = "finish";
    pub const RESET: &str = "reset";
    pub const RESOURCE: &str = "resource";
}
