//! Partition counters
//!
//! Plain atomic counters exposed as read-only accessors; formatting and
//! reporting live in the benchmark harness, not here.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use vershard_core::PartitionId;

/// Admission counters for one partition.
#[derive(Debug, Default)]
pub struct PartitionMetrics {
    pub(crate) prepares: AtomicU64,
    pub(crate) commits: AtomicU64,
    pub(crate) aborts: AtomicU64,
    pub(crate) version_conflicts: AtomicU64,
    pub(crate) lock_conflicts: AtomicU64,
    pub(crate) buffered_admissions: AtomicU64,
    pub(crate) ejected: AtomicU64,
}

impl PartitionMetrics {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_ejected(&self, n: u64) {
        self.ejected.fetch_add(n, Ordering::Relaxed);
    }

    /// Total `prepare` calls.
    pub fn prepares(&self) -> u64 {
        self.prepares.load(Ordering::Relaxed)
    }

    /// Successful commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Explicit aborts.
    pub fn aborts(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }

    /// Prepares rejected because a read was permanently stale, plus
    /// buffered transactions that turned out superseded while registering.
    pub fn version_conflicts(&self) -> u64 {
        self.version_conflicts.load(Ordering::Relaxed)
    }

    /// Prepares (immediate or deferred) refused an object lock.
    pub fn lock_conflicts(&self) -> u64 {
        self.lock_conflicts.load(Ordering::Relaxed)
    }

    /// Transactions that entered the dependency buffer.
    pub fn buffered_admissions(&self) -> u64 {
        self.buffered_admissions.load(Ordering::Relaxed)
    }

    /// Buffered transactions aborted by a newer version landing.
    pub fn ejected(&self) -> u64 {
        self.ejected.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of a partition's counters, for reports.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionSnapshot {
    /// Partition id.
    pub id: PartitionId,
    /// Total `prepare` calls.
    pub prepares: u64,
    /// Successful commits.
    pub commits: u64,
    /// Explicit aborts.
    pub aborts: u64,
    /// Permanent version-conflict rejections.
    pub version_conflicts: u64,
    /// Lock-conflict refusals.
    pub lock_conflicts: u64,
    /// Admissions into the dependency buffer.
    pub buffered_admissions: u64,
    /// Buffered transactions ejected by newer versions.
    pub ejected: u64,
    /// Transactions buffered at snapshot time.
    pub buffered_now: u64,
}

impl PartitionSnapshot {
    /// CSV header matching [`PartitionSnapshot::csv_row`].
    pub fn csv_header() -> &'static str {
        "id,prepares,commits,aborts,version_conflicts,lock_conflicts,buffered_admissions,ejected,buffered_now"
    }

    /// One CSV row of the counters.
    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.id,
            self.prepares,
            self.commits,
            self.aborts,
            self.version_conflicts,
            self.lock_conflicts,
            self.buffered_admissions,
            self.ejected,
            self.buffered_now
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_and_formats() {
        let snap = PartitionSnapshot {
            id: 1,
            prepares: 10,
            commits: 7,
            aborts: 3,
            version_conflicts: 2,
            lock_conflicts: 1,
            buffered_admissions: 4,
            ejected: 1,
            buffered_now: 0,
        };
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"commits\":7"));

        let row = snap.csv_row();
        assert_eq!(row.split(',').count(), PartitionSnapshot::csv_header().split(',').count());
    }
}
