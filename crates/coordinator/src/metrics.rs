//! Coordinator counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome counters for one coordinator.
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    pub(crate) commits: AtomicU64,
    pub(crate) aborts: AtomicU64,
    pub(crate) lock_aborts: AtomicU64,
}

impl CoordinatorMetrics {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Transactions committed on every touched partition.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Transactions abandoned for any reason.
    pub fn aborts(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }

    /// Aborts caused by the coordinator-local lock grab failing — the
    /// transaction never reached any partition.
    pub fn lock_aborts(&self) -> u64 {
        self.lock_aborts.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of a coordinator's counters.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    /// Coordinator id.
    pub id: u32,
    /// Fully committed transactions.
    pub commits: u64,
    /// Abandoned transactions.
    pub aborts: u64,
    /// Aborts on the coordinator-local lock grab.
    pub lock_aborts: u64,
}

impl CoordinatorSnapshot {
    /// CSV header matching [`CoordinatorSnapshot::csv_row`].
    pub fn csv_header() -> &'static str {
        "id,commits,aborts,lock_aborts"
    }

    /// One CSV row of the counters.
    pub fn csv_row(&self) -> String {
        format!("{},{},{},{}", self.id, self.commits, self.aborts, self.lock_aborts)
    }
}
