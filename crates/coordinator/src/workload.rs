//! Random transaction generation
//!
//! Builds transactions against a coordinator's cached view of the store:
//! a random subset of the known objects is read at the cached versions,
//! and a leading share of the subset is upgraded to writes at the next
//! version. Deterministic under a fixed seed.

use crate::directory::{Directory, VersionCache};
use crate::transaction::Transaction;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use vershard_core::{Error, ObjectVersion, Result, TxnId};
use vershard_store::Partition;

/// Id-class stride: generator `wid` stamps every id it hands out, so
/// concurrent generators never collide.
const ID_STRIDE: u64 = 64;

/// Workload parameters.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadConfig {
    /// Fraction of the known objects each transaction touches.
    pub txn_size: f64,
    /// Fraction of touched objects that are upgraded to writes.
    pub write_ratio: f64,
    /// RNG seed; each generator folds its own id in, so distinct workers
    /// draw distinct streams from the same configured seed.
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            txn_size: 0.001,
            write_ratio: 0.1,
            seed: 42,
        }
    }
}

impl WorkloadConfig {
    /// Check the ratios are sensible.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.txn_size) || self.txn_size == 0.0 {
            return Err(Error::Config(format!(
                "txn_size must be within (0, 1], got {}",
                self.txn_size
            )));
        }
        if !(0.0..=1.0).contains(&self.write_ratio) {
            return Err(Error::Config(format!(
                "write_ratio must be within [0, 1], got {}",
                self.write_ratio
            )));
        }
        Ok(())
    }
}

/// Generates transactions for one worker against shared partitions.
#[derive(Debug)]
pub struct WorkloadGenerator {
    wid: u64,
    partitions: Vec<Arc<Partition>>,
    directory: Arc<Directory>,
    cache: Arc<VersionCache>,
    config: WorkloadConfig,
    rng: StdRng,
    next_tid: u64,
    next_oid: u64,
}

impl WorkloadGenerator {
    /// Create a generator stamping ids with `wid`, reading placement from
    /// `directory` and versions from `cache` (normally the owning
    /// coordinator's cache handle).
    pub fn new(
        wid: u64,
        partitions: Vec<Arc<Partition>>,
        directory: Arc<Directory>,
        cache: Arc<VersionCache>,
        config: WorkloadConfig,
    ) -> Result<Self> {
        config.validate()?;
        if partitions.is_empty() {
            return Err(Error::Config("at least one partition required".into()));
        }
        Ok(Self {
            wid,
            partitions,
            directory,
            cache,
            config,
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(wid)),
            next_tid: 0,
            next_oid: 0,
        })
    }

    fn fresh_tid(&mut self) -> TxnId {
        let tid = self.next_tid * ID_STRIDE + self.wid;
        self.next_tid += 1;
        tid
    }

    fn fresh_oid(&mut self) -> u64 {
        let oid = self.next_oid * ID_STRIDE + self.wid;
        self.next_oid += 1;
        oid
    }

    /// The initial population: `per_partition` fresh objects written at
    /// version 0 on every partition, registered in the directory.
    /// Executing this transaction brings the store and the coordinator's
    /// cache to a common baseline.
    pub fn seed_txn(&mut self, per_partition: usize) -> Transaction {
        let tid = self.fresh_tid();
        let mut txn = Transaction::new(tid);
        let partitions = self.partitions.clone();
        for (index, partition) in partitions.iter().enumerate() {
            for _ in 0..per_partition {
                let oid = self.fresh_oid();
                self.directory.assign(oid, index);
                txn.write(partition, ObjectVersion::new(oid, 0));
            }
        }
        txn
    }

    /// A random transaction: a `txn_size` sample of the known objects,
    /// read at cached versions, the leading `write_ratio` share upgraded
    /// to writes at the successor version.
    pub fn next_txn(&mut self) -> Transaction {
        let objects = self.directory.objects();
        let total = ((self.config.txn_size * objects.len() as f64).floor() as usize)
            .clamp(1, objects.len().max(1));
        let write_count = ((total as f64) * self.config.write_ratio).round() as usize;

        let sample: Vec<u64> = objects
            .choose_multiple(&mut self.rng, total)
            .copied()
            .collect();

        let tid = self.fresh_tid();
        let mut txn = Transaction::new(tid);
        for (i, &oid) in sample.iter().enumerate() {
            let index = match self.directory.locate(oid) {
                Some(index) => index,
                None => continue,
            };
            let partition = &self.partitions[index];
            let seen = self.cache.get(oid);
            let read = ObjectVersion::new(oid, seen);
            txn.read(partition, read);
            if i < write_count {
                txn.write(partition, read.next());
            }
        }
        txn
    }
}
