//! Engine metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::{FailureKind, Outcome};

/// Counters for one engine run
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Units handed to a worker
    dispatched: AtomicU64,
    /// Units currently executing
    in_flight: AtomicUsize,
    /// Highest observed in-flight count
    peak_in_flight: AtomicUsize,
    succeeded: AtomicU64,
    /// Failures of any kind, timeouts included
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker picked up a unit
    pub fn unit_started(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    /// A unit resolved
    pub fn unit_finished(&self, outcome: &Outcome) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match outcome {
            Outcome::Success { .. } => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failure(failure) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                if failure.kind == FailureKind::Timeout {
                    self.timed_out.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            dispatched: self.dispatched(),
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            timed_out: self.timed_out(),
        }
    }
}

/// Snapshot of engine metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub dispatched: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl EngineSnapshot {
    pub fn resolved(&self) -> u64 {
        self.succeeded + self.failed
    }
}
