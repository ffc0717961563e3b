//! Driving one transaction through its partitions

use crate::config::{CoordinatorConfig, PreparePolicy};
use crate::directory::VersionCache;
use crate::metrics::{CoordinatorMetrics, CoordinatorSnapshot};
use crate::transaction::Transaction;
use std::sync::Arc;
use std::thread;
use vershard_core::ObjectVersion;
use vershard_locking::LockTable;

/// Drives multi-partition transactions through prepare/commit/abort.
///
/// A coordinator serializes its own overlapping transactions through a
/// local lock table using the same sorted-acquisition discipline the
/// partitions use, keeping transactions that share objects from racing
/// each other into the partitions in the first place. It also maintains a
/// version cache — the versions it last saw for each object — refreshed
/// by its commits and by the stale-read notifications on rejections.
#[derive(Debug)]
pub struct Coordinator {
    id: u32,
    cache: Arc<VersionCache>,
    local_locks: LockTable,
    config: CoordinatorConfig,
    metrics: CoordinatorMetrics,
}

impl Coordinator {
    /// Create a coordinator with the given scheduling configuration.
    pub fn new(id: u32, config: CoordinatorConfig) -> Self {
        Self {
            id,
            cache: Arc::new(VersionCache::new()),
            local_locks: LockTable::new(),
            config,
            metrics: CoordinatorMetrics::default(),
        }
    }

    /// This coordinator's id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The coordinator's last-seen-version cache. Workload generators
    /// share this handle so fresh transactions read at cached versions.
    pub fn cache(&self) -> &Arc<VersionCache> {
        &self.cache
    }

    /// Counter accessors.
    pub fn metrics(&self) -> &CoordinatorMetrics {
        &self.metrics
    }

    /// Copy of the counters.
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            id: self.id,
            commits: self.metrics.commits(),
            aborts: self.metrics.aborts(),
            lock_aborts: self.metrics.lock_aborts(),
        }
    }

    /// Run one transaction to completion: local locks, prepare on every
    /// touched partition, then commit-all or abort-all.
    ///
    /// Returns `true` iff every partition accepted and the transaction
    /// committed everywhere. A `false` transaction was aborted everywhere
    /// and is abandoned; the caller may rebuild it against the refreshed
    /// cache and try again with a new id.
    pub fn execute(&self, txn: &Transaction) -> bool {
        let tid = txn.tid();
        let reads: Vec<ObjectVersion> = txn.read_set().copied().collect();
        let writes: Vec<ObjectVersion> = txn.write_set().copied().collect();

        if !self.local_locks.grab(reads.iter(), writes.iter(), tid) {
            CoordinatorMetrics::bump(&self.metrics.lock_aborts);
            CoordinatorMetrics::bump(&self.metrics.aborts);
            tracing::debug!(coordinator = self.id, tid, "local lock conflict");
            return false;
        }

        let committed = self.run(txn);
        self.local_locks.release(reads.iter(), writes.iter(), tid);
        committed
    }

    fn run(&self, txn: &Transaction) -> bool {
        let tid = txn.tid();
        let mut all_accepted = true;
        let mut stale: Vec<ObjectVersion> = Vec::new();

        match self.config.prepare {
            PreparePolicy::Sequential => {
                for op in txn.ops() {
                    let ticket =
                        op.partition()
                            .prepare(tid, op.reads().clone(), op.writes().clone());
                    stale.extend_from_slice(ticket.stale_reads());
                    if !ticket.wait() {
                        all_accepted = false;
                        break;
                    }
                }
            }
            PreparePolicy::Concurrent => {
                let outcomes: Vec<(bool, Vec<ObjectVersion>)> = thread::scope(|scope| {
                    let handles: Vec<_> = txn
                        .ops()
                        .iter()
                        .map(|op| {
                            scope.spawn(move || {
                                let ticket = op.partition().prepare(
                                    tid,
                                    op.reads().clone(),
                                    op.writes().clone(),
                                );
                                let stale = ticket.stale_reads().to_vec();
                                (ticket.wait(), stale)
                            })
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|h| h.join().unwrap_or((false, Vec::new())))
                        .collect()
                });
                for (accepted, notified) in outcomes {
                    all_accepted &= accepted;
                    stale.extend(notified);
                }
            }
        }

        if all_accepted {
            for op in txn.ops() {
                op.partition().commit(tid);
            }
            for w in txn.write_set() {
                self.cache.observe(*w);
            }
            CoordinatorMetrics::bump(&self.metrics.commits);
            tracing::debug!(coordinator = self.id, tid, "committed");
            true
        } else {
            for op in txn.ops() {
                op.partition().abort(tid);
            }
            for s in stale {
                self.cache.observe(s);
            }
            CoordinatorMetrics::bump(&self.metrics.aborts);
            tracing::debug!(coordinator = self.id, tid, "abandoned");
            false
        }
    }
}
