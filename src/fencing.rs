//! Invoker fencing on the master side.
//!
//! The master tracks, per invoker, which jobs it dispatched and under which
//! invoker epoch. A status report carrying a different epoch means the
//! invoker reset or restarted: everything dispatched under the old epoch is
//! lost and must be re-dispatched. Admission is bounded by the `max_new_jobs`
//! of the latest report minus whatever was dispatched since.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use judge_protocol::{InvokerStatus, Job};
use thiserror::Error;

/// Errors from dispatching a job to an invoker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("invoker '{address}' has no free slots")]
    NoCapacity { address: String },

    #[error("unknown invoker '{0}'")]
    UnknownInvoker(String),

    #[error("job '{0}' is already dispatched")]
    DuplicateJob(String),
}

/// What a status report changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusOutcome {
    /// Jobs that must be dispatched again.
    pub lost: Vec<Job>,
    /// IDs of jobs the invoker is done with.
    pub finished: Vec<String>,
    /// The report carried a different epoch than the previous one.
    pub epoch_changed: bool,
}

#[derive(Debug, Clone)]
struct Dispatched {
    job: Job,
    epoch: String,
    dispatched_at: DateTime<Utc>,
    /// Reports observed since dispatch.
    reports: u32,
    seen_active: bool,
}

/// Master-side view of one invoker.
#[derive(Debug, Clone)]
pub struct InvokerTracker {
    address: String,
    epoch: Option<String>,
    max_new_jobs: usize,
    dispatched_since_report: usize,
    jobs: BTreeMap<String, Dispatched>,
    last_seen: Option<DateTime<Utc>>,
}

impl InvokerTracker {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            epoch: None,
            max_new_jobs: 0,
            dispatched_since_report: 0,
            jobs: BTreeMap::new(),
            last_seen: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Epoch of the latest report.
    pub fn epoch(&self) -> Option<&str> {
        self.epoch.as_deref()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Apply a status report received at `now`.
    pub fn observe(&mut self, status: &InvokerStatus, now: DateTime<Utc>) -> StatusOutcome {
        let epoch_changed = self.epoch.as_deref().is_some_and(|e| e != status.epoch);
        if epoch_changed {
            tracing::warn!(
                address = %self.address,
                old_epoch = self.epoch.as_deref().unwrap_or_default(),
                new_epoch = %status.epoch,
                "invoker epoch changed"
            );
        }

        let mut outcome = StatusOutcome {
            epoch_changed,
            ..StatusOutcome::default()
        };

        let ids: Vec<String> = self.jobs.keys().cloned().collect();
        for id in ids {
            let Some(entry) = self.jobs.get_mut(&id) else {
                continue;
            };
            entry.reports += 1;

            if entry.epoch != status.epoch {
                if let Some(lost) = self.jobs.remove(&id) {
                    tracing::warn!(
                        address = %self.address,
                        job = %lost.job,
                        epoch = %lost.epoch,
                        dispatched_at = %lost.dispatched_at,
                        "job lost to epoch change"
                    );
                    outcome.lost.push(lost.job);
                }
                continue;
            }

            if status.active_job_ids.iter().any(|active| *active == id) {
                entry.seen_active = true;
                continue;
            }

            // Absent from the very first report after dispatch may only mean
            // the report was built before the job arrived.
            if entry.seen_active || entry.reports >= 2 {
                self.jobs.remove(&id);
                outcome.finished.push(id);
            }
        }

        self.epoch = Some(status.epoch.clone());
        self.max_new_jobs = status.max_new_jobs;
        self.dispatched_since_report = 0;
        self.last_seen = Some(now);
        outcome
    }

    /// Jobs that may still be dispatched before the next report.
    pub fn available_slots(&self) -> usize {
        self.max_new_jobs.saturating_sub(self.dispatched_since_report)
    }

    /// Record `job` as sent to this invoker under the latest reported epoch.
    pub fn dispatch(&mut self, job: Job, now: DateTime<Utc>) -> Result<(), AdmissionError> {
        if self.jobs.contains_key(&job.id) {
            return Err(AdmissionError::DuplicateJob(job.id));
        }
        let epoch = match &self.epoch {
            Some(epoch) if self.available_slots() > 0 => epoch.clone(),
            _ => {
                return Err(AdmissionError::NoCapacity {
                    address: self.address.clone(),
                })
            }
        };

        tracing::debug!(address = %self.address, job = %job, epoch = %epoch, "dispatching job");
        self.dispatched_since_report += 1;
        self.jobs.insert(
            job.id.clone(),
            Dispatched {
                job,
                epoch,
                dispatched_at: now,
                reports: 0,
                seen_active: false,
            },
        );
        Ok(())
    }

    /// Jobs dispatched under the current epoch, ordered by id.
    pub fn active_jobs(&self) -> Vec<&Job> {
        self.jobs
            .values()
            .filter(|d| Some(d.epoch.as_str()) == self.epoch.as_deref())
            .map(|d| &d.job)
            .collect()
    }

    /// Remove and return every outstanding job.
    fn drain(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs).into_values().map(|d| d.job).collect()
    }
}

/// All invokers known to the master, by address.
#[derive(Debug, Default)]
pub struct InvokerRegistry {
    invokers: BTreeMap<String, InvokerTracker>,
}

impl InvokerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a report, registering the invoker on first contact.
    pub fn observe(&mut self, status: &InvokerStatus, now: DateTime<Utc>) -> StatusOutcome {
        let tracker = self.invokers.entry(status.address.clone()).or_insert_with(|| {
            tracing::info!(address = %status.address, epoch = %status.epoch, "registered invoker");
            InvokerTracker::new(status.address.clone())
        });
        tracker.observe(status, now)
    }

    pub fn dispatch(&mut self, address: &str, job: Job, now: DateTime<Utc>) -> Result<(), AdmissionError> {
        self.invokers
            .get_mut(address)
            .ok_or_else(|| AdmissionError::UnknownInvoker(address.to_string()))?
            .dispatch(job, now)
    }

    /// Free slots of an invoker; zero when it is unknown.
    pub fn available_slots(&self, address: &str) -> usize {
        self.invokers.get(address).map_or(0, InvokerTracker::available_slots)
    }

    /// Invoker with the most free slots, lowest address first on ties.
    pub fn least_loaded(&self) -> Option<&str> {
        self.invokers
            .values()
            .filter(|t| t.available_slots() > 0)
            .max_by(|a, b| {
                a.available_slots()
                    .cmp(&b.available_slots())
                    .then_with(|| b.address.cmp(&a.address))
            })
            .map(InvokerTracker::address)
    }

    pub fn get(&self, address: &str) -> Option<&InvokerTracker> {
        self.invokers.get(address)
    }

    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }

    /// Forget invokers silent for longer than `timeout` and return their
    /// outstanding jobs as lost.
    pub fn expire_silent(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<Job> {
        let expired: Vec<String> = self
            .invokers
            .values()
            .filter(|t| t.last_seen.map_or(true, |seen| now - seen > timeout))
            .map(|t| t.address.clone())
            .collect();

        let mut lost = Vec::new();
        for address in expired {
            if let Some(mut tracker) = self.invokers.remove(&address) {
                let jobs = tracker.drain();
                tracing::warn!(address = %address, lost = jobs.len(), "invoker timed out");
                lost.extend(jobs);
            }
        }
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn status(epoch: &str, max_new_jobs: usize, active: &[&str]) -> InvokerStatus {
        InvokerStatus {
            max_new_jobs,
            active_job_ids: active.iter().map(|s| s.to_string()).collect(),
            epoch: epoch.to_string(),
            address: "inv-a:7070".to_string(),
            metrics: None,
        }
    }

    #[test]
    fn test_no_slots_before_first_report() {
        let mut tracker = InvokerTracker::new("inv-a:7070");
        assert_eq!(tracker.available_slots(), 0);
        assert!(matches!(
            tracker.dispatch(Job::compile("c", 1), at(0)),
            Err(AdmissionError::NoCapacity { .. })
        ));
    }

    #[test]
    fn test_dispatch_consumes_reported_slots() {
        let mut tracker = InvokerTracker::new("inv-a:7070");
        tracker.observe(&status("1", 2, &[]), at(0));

        tracker.dispatch(Job::compile("a", 1), at(1)).unwrap();
        assert_eq!(tracker.available_slots(), 1);
        assert_eq!(
            tracker.dispatch(Job::compile("a", 1), at(1)),
            Err(AdmissionError::DuplicateJob("a".to_string()))
        );
        tracker.dispatch(Job::compile("b", 2), at(1)).unwrap();
        assert_eq!(tracker.available_slots(), 0);
        assert!(tracker.dispatch(Job::compile("c", 3), at(1)).is_err());

        // A fresh report restores the budget.
        tracker.observe(&status("1", 1, &["a", "b"]), at(2));
        assert_eq!(tracker.available_slots(), 1);
    }

    #[test]
    fn test_epoch_change_loses_old_jobs() {
        let mut tracker = InvokerTracker::new("inv-a:7070");
        tracker.observe(&status("1", 4, &[]), at(0));
        tracker.dispatch(Job::compile("j", 1), at(1)).unwrap();

        let outcome = tracker.observe(&status("2", 4, &["j"]), at(2));

        assert!(outcome.epoch_changed);
        assert_eq!(outcome.lost.len(), 1);
        assert_eq!(outcome.lost[0].id, "j");
        assert!(tracker.active_jobs().is_empty());
        assert_eq!(tracker.epoch(), Some("2"));
    }

    #[test]
    fn test_absent_job_finishes_only_after_grace_report() {
        let mut tracker = InvokerTracker::new("inv-a:7070");
        tracker.observe(&status("1", 4, &[]), at(0));
        tracker.dispatch(Job::compile("j", 1), at(1)).unwrap();

        // Built before the job arrived.
        let outcome = tracker.observe(&status("1", 4, &[]), at(2));
        assert!(outcome.finished.is_empty());
        assert_eq!(tracker.active_jobs().len(), 1);

        let outcome = tracker.observe(&status("1", 4, &[]), at(3));
        assert_eq!(outcome.finished, vec!["j"]);
        assert!(tracker.active_jobs().is_empty());
    }

    #[test]
    fn test_seen_job_finishes_when_absent() {
        let mut tracker = InvokerTracker::new("inv-a:7070");
        tracker.observe(&status("1", 4, &[]), at(0));
        tracker.dispatch(Job::compile("j", 1), at(1)).unwrap();
        tracker.observe(&status("1", 3, &["j"]), at(2));

        let outcome = tracker.observe(&status("1", 4, &[]), at(3));
        assert_eq!(outcome.finished, vec!["j"]);
        assert!(!outcome.epoch_changed);
        assert!(outcome.lost.is_empty());
    }

    #[test]
    fn test_registry_dispatch_and_expiry() {
        let mut registry = InvokerRegistry::new();
        assert_eq!(
            registry.dispatch("inv-a:7070", Job::compile("c", 1), at(0)),
            Err(AdmissionError::UnknownInvoker("inv-a:7070".to_string()))
        );

        registry.observe(&status("1", 2, &[]), at(0));
        let mut other = status("x", 5, &[]);
        other.address = "inv-b:7070".to_string();
        registry.observe(&other, at(50));

        assert_eq!(registry.least_loaded(), Some("inv-b:7070"));
        registry.dispatch("inv-a:7070", Job::compile("c", 1), at(1)).unwrap();
        assert_eq!(registry.available_slots("inv-a:7070"), 1);
        assert_eq!(registry.available_slots("nope"), 0);

        let lost = registry.expire_silent(at(60), Duration::seconds(30));
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].id, "c");
        assert_eq!(registry.len(), 1);
        assert!(registry.get("inv-b:7070").is_some());
    }
}
