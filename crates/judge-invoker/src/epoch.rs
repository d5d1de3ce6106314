//! Invoker epoch.
//!
//! The epoch counter changes once per explicit reset. Cache paths and status
//! reports are both derived from it, so a master that sees a new epoch knows
//! every job it dispatched under the old one is gone.
//!
//! The counter restarts at 0 with the process, so the value reported to the
//! master is prefixed with a per-process instance label: a restarted invoker
//! never repeats an epoch string.

use parking_lot::Mutex;
use uuid::Uuid;

/// Epoch counter plus the process instance label.
#[derive(Debug)]
pub struct EpochHolder {
    instance: String,
    counter: Mutex<u64>,
}

impl Default for EpochHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochHolder {
    /// Start at epoch 0 with a random instance label.
    pub fn new() -> Self {
        Self::with_instance(Uuid::new_v4().simple().to_string())
    }

    /// Start at epoch 0 with a fixed instance label.
    pub fn with_instance(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            counter: Mutex::new(0),
        }
    }

    /// Advance to the next epoch and return it.
    pub fn reset(&self) -> u64 {
        let mut counter = self.counter.lock();
        *counter += 1;
        tracing::info!(epoch = *counter, instance = %self.instance, "epoch advanced");
        *counter
    }

    /// Current epoch counter.
    pub fn current(&self) -> u64 {
        *self.counter.lock()
    }

    /// Epoch as reported to the master.
    pub fn status_epoch(&self) -> String {
        let counter = *self.counter.lock();
        self.label(counter)
    }

    /// Reported form of a given epoch counter.
    pub fn label(&self, counter: u64) -> String {
        format!("{}-{}", self.instance, counter)
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_zero() {
        let epoch = EpochHolder::with_instance("inv");
        assert_eq!(epoch.current(), 0);
        assert_eq!(epoch.status_epoch(), "inv-0");
    }

    #[test]
    fn test_reset_increments_by_one() {
        let epoch = EpochHolder::with_instance("inv");
        assert_eq!(epoch.reset(), 1);
        assert_eq!(epoch.reset(), 2);
        assert_eq!(epoch.current(), 2);
        assert_eq!(epoch.status_epoch(), "inv-2");
    }

    #[test]
    fn test_concurrent_resets_are_gap_free() {
        let epoch = Arc::new(EpochHolder::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let epoch = Arc::clone(&epoch);
                thread::spawn(move || (0..50).map(|_| epoch.reset()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = BTreeSet::new();
        for handle in handles {
            let values = handle.join().unwrap();
            // Each caller observes its own resets in increasing order.
            assert!(values.windows(2).all(|w| w[0] < w[1]));
            seen.extend(values);
        }

        assert_eq!(seen.len(), 400);
        assert_eq!(seen.iter().copied().collect::<Vec<_>>(), (1..=400).collect::<Vec<_>>());
        assert_eq!(epoch.current(), 400);
    }

    #[test]
    fn test_instances_differ() {
        let a = EpochHolder::new();
        let b = EpochHolder::new();
        assert_ne!(a.status_epoch(), b.status_epoch());
    }
}
