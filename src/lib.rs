//! Judge Master Library
//!
//! Master-side bookkeeping for invokers: epoch fencing of dispatched jobs,
//! admission against each invoker's reported capacity, and the compile/test
//! job plan of a submission.

pub mod fencing;
pub mod submission;

pub use fencing::{AdmissionError, InvokerRegistry, InvokerTracker, StatusOutcome};
pub use submission::{plan_submission, SubmissionPlan};
