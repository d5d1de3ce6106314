//! Jobs held by this invoker.
//!
//! The registry is the invoker's side of admission control: it refuses jobs
//! beyond its capacity, tracks which are active, and holds a job back while
//! a job it requires is still active here. The master only dispatches a job
//! once its requirements succeeded somewhere, so a requirement this invoker
//! does not hold counts as met.
//!
//! Admission and reset share one lock with the epoch bump, so every active
//! job was accepted under the current epoch.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use judge_protocol::Job;
use lru::LruCache;
use parking_lot::Mutex;
use thiserror::Error;

use crate::epoch::EpochHolder;

/// Failed job IDs remembered to refuse late dependents.
pub const DEFAULT_FAILURE_MEMORY: usize = 1024;

/// Errors from job registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job '{0}' is already active")]
    Duplicate(String),

    #[error("job '{0}' not found")]
    NotFound(String),

    #[error("invoker is at capacity ({capacity} jobs)")]
    NoCapacity { capacity: usize },

    #[error("job '{job}' requires '{required}', which failed")]
    RequirementFailed { job: String, required: String },
}

/// A job accepted by this invoker.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub job: Job,
    /// Epoch counter at acceptance.
    pub epoch: u64,
    pub accepted_at: Instant,
}

/// Result of admitting a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// No job it requires is active here.
    pub runnable: bool,
    /// Epoch counter the job was accepted under.
    pub epoch: u64,
}

/// Outcome of finishing a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishOutcome {
    /// Active jobs that became runnable.
    pub runnable: Vec<String>,
    /// Active jobs dropped because something they require failed.
    pub cancelled: Vec<String>,
}

struct Registry {
    active: BTreeMap<String, ActiveJob>,
    failed: LruCache<String, ()>,
}

impl Registry {
    fn is_blocked(&self, job: &Job) -> bool {
        job.required_job_ids.iter().any(|id| self.active.contains_key(id))
    }

    fn dependents_of(&self, job_id: &str) -> Vec<String> {
        self.active
            .values()
            .filter(|a| a.job.required_job_ids.iter().any(|id| id == job_id))
            .map(|a| a.job.id.clone())
            .collect()
    }
}

/// Thread-safe set of active jobs with a fixed capacity.
pub struct JobRegistry {
    capacity: usize,
    epoch: Arc<EpochHolder>,
    inner: Mutex<Registry>,
}

impl JobRegistry {
    pub fn new(capacity: usize, epoch: Arc<EpochHolder>) -> Self {
        Self::with_failure_memory(capacity, epoch, DEFAULT_FAILURE_MEMORY)
    }

    /// Registry remembering at most `failure_memory` failed job IDs.
    pub fn with_failure_memory(capacity: usize, epoch: Arc<EpochHolder>, failure_memory: usize) -> Self {
        let failure_memory = NonZeroUsize::new(failure_memory).unwrap_or(NonZeroUsize::MIN);
        Self {
            capacity,
            epoch,
            inner: Mutex::new(Registry {
                active: BTreeMap::new(),
                failed: LruCache::new(failure_memory),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admit a job under the current epoch.
    pub fn accept(&self, job: Job) -> Result<Admission, JobError> {
        let mut inner = self.inner.lock();
        if inner.active.contains_key(&job.id) {
            return Err(JobError::Duplicate(job.id));
        }
        if inner.active.len() >= self.capacity {
            return Err(JobError::NoCapacity { capacity: self.capacity });
        }
        if let Some(required) = job.required_job_ids.iter().find(|id| inner.failed.contains(*id)) {
            tracing::warn!(job = %job, required = %required, "refusing job whose requirement failed");
            return Err(JobError::RequirementFailed {
                required: required.clone(),
                job: job.id,
            });
        }

        let epoch = self.epoch.current();
        let runnable = !inner.is_blocked(&job);
        tracing::info!(job = %job, epoch, runnable, "accepted job");
        inner.active.insert(
            job.id.clone(),
            ActiveJob {
                job,
                epoch,
                accepted_at: Instant::now(),
            },
        );
        Ok(Admission { runnable, epoch })
    }

    /// Record the outcome of an active job.
    ///
    /// A failure also drops every active job that transitively requires it.
    pub fn finish(&self, job_id: &str, success: bool) -> Result<FinishOutcome, JobError> {
        let mut inner = self.inner.lock();
        let finished = inner
            .active
            .remove(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        tracing::info!(
            job = %finished.job,
            success,
            elapsed_ms = finished.accepted_at.elapsed().as_millis() as u64,
            "job finished"
        );

        let mut outcome = FinishOutcome::default();
        if success {
            outcome.runnable = inner
                .dependents_of(job_id)
                .into_iter()
                .filter(|id| inner.active.get(id).is_some_and(|a| !inner.is_blocked(&a.job)))
                .collect();
            return Ok(outcome);
        }

        let mut pending = vec![job_id.to_string()];
        while let Some(failed) = pending.pop() {
            for id in inner.dependents_of(&failed) {
                inner.active.remove(&id);
                tracing::warn!(job_id = %id, failed = %failed, "dropping job whose requirement failed");
                pending.push(id.clone());
                outcome.cancelled.push(id);
            }
            inner.failed.put(failed, ());
        }
        outcome.cancelled.sort();
        Ok(outcome)
    }

    /// Active jobs with no required job still active.
    pub fn runnable(&self) -> Vec<Job> {
        let inner = self.inner.lock();
        inner
            .active
            .values()
            .filter(|a| !inner.is_blocked(&a.job))
            .map(|a| a.job.clone())
            .collect()
    }

    /// Sorted IDs of active jobs.
    pub fn active_ids(&self) -> Vec<String> {
        self.inner.lock().active.keys().cloned().collect()
    }

    /// Sorted active IDs and the room left, read together.
    pub fn snapshot(&self) -> (Vec<String>, usize) {
        let inner = self.inner.lock();
        let active: Vec<String> = inner.active.keys().cloned().collect();
        let room = self.capacity.saturating_sub(active.len());
        (active, room)
    }

    pub fn get(&self, job_id: &str) -> Option<ActiveJob> {
        self.inner.lock().active.get(job_id).cloned()
    }

    /// Advance the epoch, dropping every active job and forgetting failures.
    /// Returns the new epoch and the dropped IDs, sorted.
    pub fn reset(&self) -> (u64, Vec<String>) {
        let mut inner = self.inner.lock();
        inner.failed.clear();
        let dropped: Vec<String> = std::mem::take(&mut inner.active).into_keys().collect();
        let epoch = self.epoch.reset();
        (epoch, dropped)
    }

    /// Room left for new jobs.
    pub fn max_new_jobs(&self) -> usize {
        self.snapshot().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Barrier;
    use std::thread;

    fn registry(capacity: usize) -> JobRegistry {
        JobRegistry::new(capacity, Arc::new(EpochHolder::with_instance("jobs")))
    }

    #[test]
    fn test_accept_until_capacity() {
        let jobs = registry(2);
        assert_eq!(jobs.max_new_jobs(), 2);

        assert!(jobs.accept(Job::compile("c-1", 1)).unwrap().runnable);
        assert!(jobs.accept(Job::compile("c-2", 2)).unwrap().runnable);
        assert_eq!(jobs.max_new_jobs(), 0);

        let err = jobs.accept(Job::compile("c-3", 3)).unwrap_err();
        assert_eq!(err, JobError::NoCapacity { capacity: 2 });
        assert_eq!(jobs.active_ids(), vec!["c-1", "c-2"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let jobs = registry(4);
        jobs.accept(Job::compile("c-1", 1)).unwrap();
        let err = jobs.accept(Job::compile("c-1", 1)).unwrap_err();
        assert_eq!(err, JobError::Duplicate("c-1".to_string()));
    }

    #[test]
    fn test_tests_wait_for_active_compile() {
        let jobs = registry(4);
        jobs.accept(Job::compile("c", 1)).unwrap();
        assert!(!jobs.accept(Job::test("t1", 1, 1, "c")).unwrap().runnable);
        assert!(!jobs.accept(Job::test("t2", 1, 2, "c")).unwrap().runnable);

        let runnable: Vec<_> = jobs.runnable().into_iter().map(|j| j.id).collect();
        assert_eq!(runnable, vec!["c"]);

        let outcome = jobs.finish("c", true).unwrap();
        assert_eq!(outcome.runnable, vec!["t1", "t2"]);
        assert!(outcome.cancelled.is_empty());
        assert_eq!(jobs.runnable().len(), 2);
        assert_eq!(jobs.get("t1").unwrap().epoch, 0);
    }

    #[test]
    fn test_requirement_compiled_elsewhere_is_runnable() {
        let jobs = registry(2);
        let admission = jobs.accept(Job::test("t1", 1, 1, "compiled-on-other-invoker")).unwrap();
        assert!(admission.runnable);
        assert_eq!(jobs.runnable().len(), 1);
    }

    #[test]
    fn test_redispatched_tests_run_after_reset() {
        let jobs = registry(2);
        jobs.accept(Job::compile("c", 1)).unwrap();
        jobs.finish("c", true).unwrap();
        jobs.accept(Job::test("t1", 1, 1, "c")).unwrap();

        let (epoch, dropped) = jobs.reset();
        assert_eq!(epoch, 1);
        assert_eq!(dropped, vec!["t1"]);

        let admission = jobs.accept(Job::test("t1", 1, 1, "c")).unwrap();
        assert_eq!(admission, Admission { runnable: true, epoch: 1 });
        assert_eq!(jobs.runnable()[0].id, "t1");
    }

    #[test]
    fn test_failed_compile_drops_dependents() {
        let jobs = registry(4);
        jobs.accept(Job::compile("c", 1)).unwrap();
        jobs.accept(Job::test("t1", 1, 1, "c")).unwrap();
        jobs.accept(Job::compile("other", 2)).unwrap();

        let outcome = jobs.finish("c", false).unwrap();
        assert_eq!(outcome.cancelled, vec!["t1"]);
        assert_eq!(jobs.active_ids(), vec!["other"]);
        assert_eq!(jobs.max_new_jobs(), 3);
    }

    #[test]
    fn test_late_dependent_of_failed_job_refused() {
        let jobs = registry(4);
        jobs.accept(Job::compile("c", 1)).unwrap();
        jobs.finish("c", false).unwrap();

        let err = jobs.accept(Job::test("t1", 1, 1, "c")).unwrap_err();
        assert_eq!(
            err,
            JobError::RequirementFailed {
                job: "t1".to_string(),
                required: "c".to_string()
            }
        );
        assert_eq!(jobs.max_new_jobs(), 4);
    }

    #[test]
    fn test_failure_memory_is_bounded() {
        let jobs = JobRegistry::with_failure_memory(1, Arc::new(EpochHolder::new()), 8);
        for i in 0..10_000 {
            let id = format!("c{}", i);
            jobs.accept(Job::compile(id.clone(), i)).unwrap();
            jobs.finish(&id, i % 2 == 0).unwrap();
        }

        assert_eq!(jobs.inner.lock().failed.len(), 8);
        // Long-forgotten failures no longer block anything.
        assert!(jobs.accept(Job::test("t", 0, 1, "c0")).unwrap().runnable);
    }

    #[test]
    fn test_reset_forgets_failures() {
        let jobs = registry(4);
        jobs.accept(Job::compile("c", 1)).unwrap();
        jobs.finish("c", false).unwrap();
        jobs.accept(Job::compile("d", 2)).unwrap();

        assert_eq!(jobs.reset(), (1, vec!["d".to_string()]));
        assert!(jobs.active_ids().is_empty());
        assert!(jobs.accept(Job::test("t", 1, 1, "c")).unwrap().runnable);
    }

    #[test]
    fn test_concurrent_accept_and_reset_keep_epochs_consistent() {
        let epoch = Arc::new(EpochHolder::with_instance("race"));
        let jobs = Arc::new(JobRegistry::new(10_000, Arc::clone(&epoch)));
        let barrier = Arc::new(Barrier::new(5));

        let mut handles: Vec<_> = (0..4)
            .map(|t| {
                let jobs = Arc::clone(&jobs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..500u64 {
                        jobs.accept(Job::compile(format!("{}-{}", t, i), i)).unwrap();
                    }
                })
            })
            .collect();
        handles.push({
            let jobs = Arc::clone(&jobs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    jobs.reset();
                }
            })
        });
        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        let current = epoch.current();
        assert_eq!(current, 200);
        for id in jobs.active_ids() {
            assert_eq!(jobs.get(&id).unwrap().epoch, current, "job {} kept a stale epoch", id);
        }
    }

    #[test]
    fn test_finish_unknown_job() {
        let jobs = registry(1);
        assert_eq!(
            jobs.finish("nope", true).unwrap_err(),
            JobError::NotFound("nope".to_string())
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Compile(u64),
        Test(u64, u64),
        Finish(u64, bool),
        Reset,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..6).prop_map(Op::Compile),
            (0u64..6, 1u64..4).prop_map(|(s, t)| Op::Test(s, t)),
            (0u64..6, any::<bool>()).prop_map(|(s, ok)| Op::Finish(s, ok)),
            Just(Op::Reset),
        ]
    }

    proptest! {
        #[test]
        fn prop_registry_invariants(capacity in 1usize..5, ops in prop::collection::vec(op(), 0..80)) {
            let epoch = Arc::new(EpochHolder::with_instance("prop"));
            let jobs = JobRegistry::with_failure_memory(capacity, Arc::clone(&epoch), 4);

            for op in ops {
                match op {
                    Op::Compile(s) => { let _ = jobs.accept(Job::compile(format!("c{}", s), s)); }
                    Op::Test(s, t) => {
                        let _ = jobs.accept(Job::test(format!("t{}-{}", s, t), s, t, format!("c{}", s)));
                    }
                    Op::Finish(s, ok) => { let _ = jobs.finish(&format!("c{}", s), ok); }
                    Op::Reset => { jobs.reset(); }
                }

                let (active, room) = jobs.snapshot();
                prop_assert!(active.len() <= capacity);
                prop_assert_eq!(active.len() + room, capacity);
                prop_assert!(jobs.inner.lock().failed.len() <= 4);
                for id in &active {
                    prop_assert_eq!(jobs.get(id).unwrap().epoch, epoch.current());
                }
                let active_set: std::collections::HashSet<&String> = active.iter().collect();
                for job in jobs.runnable() {
                    prop_assert!(job.required_job_ids.iter().all(|r| !active_set.contains(r)));
                }
            }
        }
    }
}
