//! The invoker process state shared by all RPC operations.

use std::sync::Arc;
use std::time::Duration;

use judge_protocol::InvokerStatus;

use crate::config::InvokerConfig;
use crate::epoch::EpochHolder;
use crate::jobs::JobRegistry;
use crate::metrics::RuntimeMetrics;
use crate::storage::{InvokerStorage, StorageConnector};

/// One invoker: artifact cache, epoch, active jobs and metrics.
pub struct Invoker {
    config: InvokerConfig,
    storage: InvokerStorage,
    jobs: JobRegistry,
    metrics: RuntimeMetrics,
}

impl Invoker {
    /// Build the invoker with a fresh epoch holder.
    ///
    /// Clears the configured cache root (see [`InvokerStorage::new`]).
    pub fn new(config: InvokerConfig, connector: Arc<dyn StorageConnector>) -> Self {
        Self::with_epoch(config, connector, Arc::new(EpochHolder::new()))
    }

    pub fn with_epoch(
        config: InvokerConfig,
        connector: Arc<dyn StorageConnector>,
        epoch: Arc<EpochHolder>,
    ) -> Self {
        let storage = InvokerStorage::new(
            config.cache.path.clone(),
            config.cache.size_bytes,
            connector,
            epoch,
        );
        let jobs = JobRegistry::new(config.job_capacity(), Arc::clone(storage.epoch()));
        let metrics = RuntimeMetrics::new(config.capacity.sandboxes, config.capacity.threads);
        tracing::info!(
            address = %config.address,
            instance = storage.epoch().instance(),
            capacity = jobs.capacity(),
            "invoker started"
        );

        Self {
            config,
            storage,
            jobs,
            metrics,
        }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn storage(&self) -> &InvokerStorage {
        &self.storage
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    /// Epoch string reported to the master.
    pub fn status_epoch(&self) -> String {
        self.storage.epoch().status_epoch()
    }

    /// Status snapshot for the master.
    pub fn status(&self, include_metrics: bool) -> InvokerStatus {
        let (active_job_ids, max_new_jobs) = self.jobs.snapshot();
        InvokerStatus {
            max_new_jobs,
            active_job_ids,
            epoch: self.status_epoch(),
            address: self.config.address.clone(),
            metrics: include_metrics.then(|| self.metrics.snapshot()),
        }
    }

    /// Execution engine hook: a job waited `waited` for sandbox `slot`.
    pub fn record_sandbox_wait(&self, slot: usize, waited: Duration) {
        self.metrics.sandboxes.record_wait(slot, waited);
    }

    /// Execution engine hook: worker thread `slot` waited `waited` for work.
    pub fn record_thread_wait(&self, slot: usize, waited: Duration) {
        self.metrics.threads.record_wait(slot, waited);
    }

    /// Start a new epoch and return its reported form.
    ///
    /// Jobs accepted under the old epoch are dropped; the master treats them
    /// as lost once it sees the new epoch.
    pub fn reset(&self) -> String {
        let (epoch, dropped) = self.jobs.reset();
        if !dropped.is_empty() {
            tracing::warn!(epoch, dropped = dropped.len(), "dropped jobs of previous epoch");
        }
        self.status_epoch()
    }

    /// Remove the cache root. Called once before the process exits.
    pub fn shutdown(&self) {
        self.storage.shutdown();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::invoker;
    use judge_protocol::Job;
    use std::time::Duration;

    #[test]
    fn test_status_reports_sorted_active_jobs() {
        let (_temp, _remote, invoker) = invoker(3);
        invoker.jobs().accept(Job::compile("b", 2)).unwrap();
        invoker.jobs().accept(Job::compile("a", 1)).unwrap();

        let status = invoker.status(false);
        assert_eq!(status.active_job_ids, vec!["a", "b"]);
        assert_eq!(status.max_new_jobs, 1);
        assert_eq!(status.epoch, "inv-0");
        assert_eq!(status.address, "invoker-test:7070");
        assert!(status.metrics.is_none());
    }

    #[test]
    fn test_status_with_metrics() {
        let (_temp, _remote, invoker) = invoker(3);
        let metrics = invoker.status(true).metrics.unwrap();
        assert!(metrics.sandbox_metrics.is_none());

        invoker.record_sandbox_wait(1, Duration::from_millis(30));
        invoker.record_thread_wait(0, Duration::from_millis(2));
        let metrics = invoker.status(true).metrics.unwrap();
        assert_eq!(metrics.sandbox_metrics.unwrap().total_wait_ms, vec![0, 30, 0]);
        assert_eq!(metrics.thread_metrics.unwrap().count, 2);
    }

    #[test]
    fn test_reset_advances_reported_epoch() {
        let (_temp, _remote, invoker) = invoker(1);
        invoker.jobs().accept(Job::compile("c", 1)).unwrap();

        assert_eq!(invoker.reset(), "inv-1");
        assert!(invoker.status(false).active_job_ids.is_empty());
        assert_eq!(invoker.status(false).epoch, "inv-1");
        assert_eq!(invoker.storage().current_epoch(), 1);
    }
}
