//! Job assignment types.
//!
//! Jobs form a per-submission dependency DAG: a Test job normally requires the
//! Compile job of the same submission. Nothing may start a job before every
//! job it requires has succeeded.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Compile,
    Test,
}

/// A unit of work delivered to an invoker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    /// Owning submission.
    pub submit_id: u64,
    #[serde(rename = "type")]
    pub job_type: JobType,
    /// Test number, only set for Test jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<u64>,
    /// Jobs that must succeed before this one may start.
    #[serde(default)]
    pub required_job_ids: Vec<String>,
}

impl Job {
    /// Create a Compile job for a submission.
    pub fn compile(id: impl Into<String>, submit_id: u64) -> Self {
        Self {
            id: id.into(),
            submit_id,
            job_type: JobType::Compile,
            test: None,
            required_job_ids: Vec::new(),
        }
    }

    /// Create a Test job that depends on the given compile job.
    pub fn test(id: impl Into<String>, submit_id: u64, test: u64, compile_job_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            submit_id,
            job_type: JobType::Test,
            test: Some(test),
            required_job_ids: vec![compile_job_id.into()],
        }
    }

    /// Whether every required job is in `succeeded`.
    pub fn is_ready(&self, succeeded: &HashSet<String>) -> bool {
        self.required_job_ids.iter().all(|id| succeeded.contains(id))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {} Submit: {} Type: {:?}", self.id, self.submit_id, self.job_type)?;
        if let Some(test) = self.test {
            write!(f, " Test: {}", test)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_wire_shape() {
        let job = Job::test("t-1", 42, 3, "c-1");
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "TEST");
        assert_eq!(value["test"], 3);
        assert_eq!(value["required_job_ids"][0], "c-1");

        let compile = serde_json::to_value(Job::compile("c-1", 42)).unwrap();
        assert!(compile.get("test").is_none());
    }

    #[test]
    fn test_required_jobs_default_to_empty() {
        let job: Job = serde_json::from_str(r#"{"id":"c-1","submit_id":7,"type":"COMPILE"}"#).unwrap();
        assert!(job.required_job_ids.is_empty());
        assert!(job.is_ready(&HashSet::new()));
    }

    #[test]
    fn test_is_ready_waits_for_compile() {
        let job = Job::test("t-1", 1, 1, "c-1");
        let mut succeeded = HashSet::new();
        assert!(!job.is_ready(&succeeded));
        succeeded.insert("c-1".to_string());
        assert!(job.is_ready(&succeeded));
    }
}
