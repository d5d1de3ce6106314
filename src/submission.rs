//! Per-submission job planning.

use std::collections::HashSet;

use judge_protocol::Job;
use uuid::Uuid;

/// Jobs that judge one submission: a compile job and one test job per test,
/// each test requiring the compile job.
#[derive(Debug, Clone)]
pub struct SubmissionPlan {
    pub submit_id: u64,
    pub compile: Job,
    pub tests: Vec<Job>,
}

impl SubmissionPlan {
    /// All jobs, compile first.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        std::iter::once(&self.compile).chain(self.tests.iter())
    }

    /// Jobs not in `succeeded` whose requirements are all in it.
    pub fn ready<'a>(&'a self, succeeded: &'a HashSet<String>) -> impl Iterator<Item = &'a Job> + 'a {
        self.jobs()
            .filter(move |job| !succeeded.contains(&job.id) && job.is_ready(succeeded))
    }
}

fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// Build the job DAG for `submit_id` over `tests`.
pub fn plan_submission(submit_id: u64, tests: &[u64]) -> SubmissionPlan {
    let compile = Job::compile(new_job_id(), submit_id);
    let tests = tests
        .iter()
        .map(|&test| Job::test(new_job_id(), submit_id, test, compile.id.clone()))
        .collect();
    SubmissionPlan {
        submit_id,
        compile,
        tests,
    }
}
