//! A multi-partition transaction

use rustc_hash::FxHashSet;
use std::sync::Arc;
use vershard_core::{ObjectVersion, TxnId};
use vershard_store::Partition;

/// The slice of a transaction addressed to one partition.
#[derive(Debug, Clone)]
pub struct PartitionOps {
    partition: Arc<Partition>,
    reads: FxHashSet<ObjectVersion>,
    writes: FxHashSet<ObjectVersion>,
}

impl PartitionOps {
    /// The partition these operations target.
    pub fn partition(&self) -> &Arc<Partition> {
        &self.partition
    }

    /// Objects read on this partition, at the versions the transaction
    /// observed when it was built.
    pub fn reads(&self) -> &FxHashSet<ObjectVersion> {
        &self.reads
    }

    /// Objects written on this partition, at the versions to install on
    /// commit.
    pub fn writes(&self) -> &FxHashSet<ObjectVersion> {
        &self.writes
    }
}

/// A transaction's combined read/write set, partitioned by owning shard.
///
/// Built once by a workload generator (or a test) and then driven by a
/// [`crate::Coordinator`]; immutable while in flight.
#[derive(Debug, Clone)]
pub struct Transaction {
    tid: TxnId,
    ops: Vec<PartitionOps>,
}

impl Transaction {
    /// Create an empty transaction.
    pub fn new(tid: TxnId) -> Self {
        Self {
            tid,
            ops: Vec::new(),
        }
    }

    /// This transaction's id.
    pub fn tid(&self) -> TxnId {
        self.tid
    }

    /// Add a read of `object` on `partition`.
    pub fn read(&mut self, partition: &Arc<Partition>, object: ObjectVersion) {
        self.ops_for(partition).reads.insert(object);
    }

    /// Add a write of `object` on `partition`.
    pub fn write(&mut self, partition: &Arc<Partition>, object: ObjectVersion) {
        self.ops_for(partition).writes.insert(object);
    }

    /// Per-partition operation slices, one entry per touched partition.
    pub fn ops(&self) -> &[PartitionOps] {
        &self.ops
    }

    /// True iff the transaction touches nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.iter().all(|op| op.reads.is_empty() && op.writes.is_empty())
    }

    /// Every read across all partitions.
    pub fn read_set(&self) -> impl Iterator<Item = &ObjectVersion> {
        self.ops.iter().flat_map(|op| op.reads.iter())
    }

    /// Every write across all partitions.
    pub fn write_set(&self) -> impl Iterator<Item = &ObjectVersion> {
        self.ops.iter().flat_map(|op| op.writes.iter())
    }

    fn ops_for(&mut self, partition: &Arc<Partition>) -> &mut PartitionOps {
        let id = partition.id();
        let pos = match self.ops.iter().position(|op| op.partition.id() == id) {
            Some(pos) => pos,
            None => {
                self.ops.push(PartitionOps {
                    partition: Arc::clone(partition),
                    reads: FxHashSet::default(),
                    writes: FxHashSet::default(),
                });
                self.ops.len() - 1
            }
        };
        &mut self.ops[pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_group_by_partition() {
        let p0 = Arc::new(Partition::new(0));
        let p1 = Arc::new(Partition::new(1));

        let mut txn = Transaction::new(1);
        assert!(txn.is_empty());

        txn.read(&p0, ObjectVersion::new(1, 0));
        txn.write(&p0, ObjectVersion::new(2, 1));
        txn.read(&p1, ObjectVersion::new(3, 0));

        assert_eq!(txn.ops().len(), 2);
        assert_eq!(txn.read_set().count(), 2);
        assert_eq!(txn.write_set().count(), 1);
        assert!(!txn.is_empty());

        let slice0 = &txn.ops()[0];
        assert_eq!(slice0.partition().id(), 0);
        assert_eq!(slice0.reads().len(), 1);
        assert_eq!(slice0.writes().len(), 1);
    }

    #[test]
    fn duplicate_entries_collapse() {
        let p0 = Arc::new(Partition::new(0));
        let mut txn = Transaction::new(1);
        txn.read(&p0, ObjectVersion::new(1, 4));
        txn.read(&p0, ObjectVersion::new(1, 4));
        assert_eq!(txn.read_set().count(), 1);
    }
}
