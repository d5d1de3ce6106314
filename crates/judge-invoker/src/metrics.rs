//! Runtime metrics reported in invoker status.
//!
//! Wait times come from the execution engine through
//! [`Invoker::record_sandbox_wait`](crate::invoker::Invoker::record_sandbox_wait)
//! and [`Invoker::record_thread_wait`](crate::invoker::Invoker::record_thread_wait).
//! A pool nothing has reported for is left out of the snapshot.

use std::time::{Duration, Instant};

use judge_protocol::{StatusMetrics, StatusThreadsMetrics};
use parking_lot::Mutex;

#[derive(Debug)]
struct Waits {
    per_slot: Vec<Duration>,
    recorded: bool,
}

/// Accumulated wait time per slot of a fixed-size pool.
#[derive(Debug)]
pub struct PoolMetrics {
    waits: Mutex<Waits>,
}

impl PoolMetrics {
    pub fn new(slots: usize) -> Self {
        Self {
            waits: Mutex::new(Waits {
                per_slot: vec![Duration::ZERO; slots],
                recorded: false,
            }),
        }
    }

    /// Add `waited` to a slot's total. Out-of-range slots are ignored.
    pub fn record_wait(&self, slot: usize, waited: Duration) {
        let mut waits = self.waits.lock();
        if let Some(total) = waits.per_slot.get_mut(slot) {
            *total += waited;
            waits.recorded = true;
        }
    }

    /// Per-slot totals, or `None` before the first recorded wait.
    pub fn snapshot(&self) -> Option<StatusThreadsMetrics> {
        let waits = self.waits.lock();
        waits.recorded.then(|| StatusThreadsMetrics {
            count: waits.per_slot.len(),
            total_wait_ms: waits.per_slot.iter().map(|d| d.as_millis() as u64).collect(),
        })
    }
}

/// Process-wide metrics.
#[derive(Debug)]
pub struct RuntimeMetrics {
    started: Instant,
    pub sandboxes: PoolMetrics,
    pub threads: PoolMetrics,
}

impl RuntimeMetrics {
    pub fn new(sandboxes: usize, threads: usize) -> Self {
        Self {
            started: Instant::now(),
            sandboxes: PoolMetrics::new(sandboxes),
            threads: PoolMetrics::new(threads),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> StatusMetrics {
        StatusMetrics {
            lifetime_ms: self.uptime().as_millis() as u64,
            sandbox_metrics: self.sandboxes.snapshot(),
            thread_metrics: self.threads.snapshot(),
        }
    }
}
