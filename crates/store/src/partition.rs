//! Partition: version bookkeeping, conflict detection, and admission
//!
//! ## Prepare outcomes
//!
//! 1. Any read strictly behind the authoritative version is a permanent
//!    conflict: the ticket resolves `false` immediately, carrying the
//!    authoritative versions so the coordinator can rebuild fresh reads.
//! 2. No future reads: the lock grab decides the outcome synchronously.
//! 3. At least one read references a future version: the transaction is
//!    parked in the dependency buffer, and the ticket settles when the
//!    buffer resolves, ejects, or cancels it.
//!
//! ## Commit cascade
//!
//! Installing a write first ejects every waiter on an older version of
//! the object, then drains waiters on exactly this version — in that
//! order, so no transaction is settled on a version it never observed.
//! Ready dependents have their locks grabbed only after the committer
//! released its own, keeping a dependent's grab from tripping over locks
//! the committer is in the middle of dropping.

use crate::metrics::{PartitionMetrics, PartitionSnapshot};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use vershard_buffer::{AddOutcome, DependencyBuffer};
use vershard_core::{ObjectId, ObjectVersion, PartitionId, Ticket, TxnId, Version, VersionMap};
use vershard_locking::LockTable;

/// One shard of the object store.
///
/// Thread-safe throughout: any worker thread may call `prepare`,
/// `commit`, and `abort` concurrently for independent transactions.
#[derive(Debug)]
pub struct Partition {
    id: PartitionId,
    versions: Arc<VersionMap>,
    pending_reads: DashMap<TxnId, FxHashSet<ObjectVersion>>,
    pending_writes: DashMap<TxnId, FxHashSet<ObjectVersion>>,
    locks: LockTable,
    buffer: DependencyBuffer,
    metrics: PartitionMetrics,
}

impl Partition {
    /// Create an empty partition.
    pub fn new(id: PartitionId) -> Self {
        let versions = Arc::new(VersionMap::new());
        let buffer = DependencyBuffer::new(Arc::clone(&versions));
        Self {
            id,
            versions,
            pending_reads: DashMap::new(),
            pending_writes: DashMap::new(),
            locks: LockTable::new(),
            buffer,
            metrics: PartitionMetrics::default(),
        }
    }

    /// This partition's id.
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Admit a transaction: version checks, then either an immediate lock
    /// grab or deferral into the dependency buffer.
    ///
    /// The returned ticket resolves `true` iff every version check passed
    /// and every required object lock was granted (possibly only after
    /// the transaction's future reads became current).
    pub fn prepare(
        &self,
        tid: TxnId,
        reads: FxHashSet<ObjectVersion>,
        writes: FxHashSet<ObjectVersion>,
    ) -> Ticket {
        PartitionMetrics::bump(&self.metrics.prepares);

        let mut stale: Vec<ObjectVersion> = Vec::new();
        let mut deferred = false;
        for r in &reads {
            let current = self.versions.get(r.oid);
            if r.vnum < current {
                stale.push(ObjectVersion::new(r.oid, current));
            } else if r.vnum > current {
                deferred = true;
            }
        }

        if !stale.is_empty() {
            PartitionMetrics::bump(&self.metrics.version_conflicts);
            tracing::debug!(
                partition = self.id,
                tid,
                stale = stale.len(),
                "permanent version conflict"
            );
            return Ticket::rejected(stale);
        }

        self.pending_reads.insert(tid, reads.clone());
        self.pending_writes.insert(tid, writes);

        if !deferred {
            let granted = self.grab_for(tid);
            if !granted {
                PartitionMetrics::bump(&self.metrics.lock_conflicts);
            }
            return Ticket::ready(granted);
        }

        match self.buffer.add(tid, reads) {
            AddOutcome::Rejected => {
                // A dependency was superseded while registering.
                self.pending_reads.remove(&tid);
                self.pending_writes.remove(&tid);
                PartitionMetrics::bump(&self.metrics.version_conflicts);
                Ticket::ready(false)
            }
            AddOutcome::Ready => {
                // Dependencies resolved while the scan was in flight.
                let granted = self.grab_for(tid);
                if !granted {
                    PartitionMetrics::bump(&self.metrics.lock_conflicts);
                }
                Ticket::ready(granted)
            }
            AddOutcome::Buffered(ticket) => {
                PartitionMetrics::bump(&self.metrics.buffered_admissions);
                tracing::trace!(partition = self.id, tid, "buffered on future reads");
                ticket
            }
        }
    }

    /// Install every write of `tid`, cascade the dependency buffer, and
    /// release the transaction's locks.
    pub fn commit(&self, tid: TxnId) {
        let mut writes: Vec<ObjectVersion> = self
            .pending_writes
            .get(&tid)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        writes.sort_unstable();

        let mut ready = Vec::new();
        for w in &writes {
            self.versions.install(*w);
            // Eject strictly-older waiters before satisfying exact-match
            // waiters: a transaction must never resolve on a version it
            // did not observe.
            let ejected = self.buffer.eject(*w);
            if ejected > 0 {
                self.metrics.add_ejected(ejected as u64);
            }
            ready.extend(self.buffer.remove(*w));
        }

        let reads = self
            .pending_reads
            .remove(&tid)
            .map(|(_, s)| s)
            .unwrap_or_default();
        let writes_set = self
            .pending_writes
            .remove(&tid)
            .map(|(_, s)| s)
            .unwrap_or_default();
        self.locks.release(reads.iter(), writes_set.iter(), tid);
        PartitionMetrics::bump(&self.metrics.commits);
        tracing::debug!(partition = self.id, tid, writes = writes.len(), "committed");

        for r in ready {
            let granted = self.grab_for(r.tid);
            if !granted {
                PartitionMetrics::bump(&self.metrics.lock_conflicts);
            }
            r.slot.resolve(granted);
        }
    }

    /// Cancel `tid`: release any locks it may hold, drop its recorded
    /// read/write sets, and cancel it out of the dependency buffer — an
    /// outstanding ticket resolves `false`.
    pub fn abort(&self, tid: TxnId) {
        let reads = self
            .pending_reads
            .remove(&tid)
            .map(|(_, s)| s)
            .unwrap_or_default();
        let writes = self
            .pending_writes
            .remove(&tid)
            .map(|(_, s)| s)
            .unwrap_or_default();
        // Speculative: tolerates locks that were never granted.
        self.locks.release(reads.iter(), writes.iter(), tid);
        self.buffer.delete(tid);
        PartitionMetrics::bump(&self.metrics.aborts);
        tracing::debug!(partition = self.id, tid, "aborted");
    }

    /// Authoritative version of `oid`; 0 if never written here.
    pub fn current_version(&self, oid: ObjectId) -> Version {
        self.versions.get(oid)
    }

    /// Number of transactions currently parked in the dependency buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Counter accessors.
    pub fn metrics(&self) -> &PartitionMetrics {
        &self.metrics
    }

    /// Copy of the counters plus the live buffered count.
    pub fn snapshot(&self) -> PartitionSnapshot {
        PartitionSnapshot {
            id: self.id,
            prepares: self.metrics.prepares(),
            commits: self.metrics.commits(),
            aborts: self.metrics.aborts(),
            version_conflicts: self.metrics.version_conflicts(),
            lock_conflicts: self.metrics.lock_conflicts(),
            buffered_admissions: self.metrics.buffered_admissions(),
            ejected: self.metrics.ejected(),
            buffered_now: self.buffered() as u64,
        }
    }

    /// The object lock table, for state inspection in tests.
    pub fn lock_table(&self) -> &LockTable {
        &self.locks
    }

    fn grab_for(&self, tid: TxnId) -> bool {
        let reads = self
            .pending_reads
            .get(&tid)
            .map(|s| s.clone())
            .unwrap_or_default();
        let writes = self
            .pending_writes
            .get(&tid)
            .map(|s| s.clone())
            .unwrap_or_default();
        self.locks.grab(reads.iter(), writes.iter(), tid)
    }
}
