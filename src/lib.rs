//! # vershard
//!
//! Optimistic MVCC admission engine for a sharded in-memory object store.
//!
//! Each partition tracks per-object version numbers and admits
//! transactions through a version-compare + two-phase-lock protocol.
//! Transactions that reference versions a partition has not seen yet are
//! parked in a dependency buffer and settle — success or failure —
//! exactly once, when the authoritative version catches up, overshoots,
//! or the transaction is cancelled. A client-side coordinator drives
//! multi-partition transactions through prepare/commit/abort.
//!
//! ## Quick Start
//!
//! ```
//! use vershard::prelude::*;
//! use std::sync::Arc;
//!
//! let partition = Arc::new(Partition::new(0));
//! let coordinator = Coordinator::new(0, CoordinatorConfig::sequential());
//!
//! // install object 1 at version 0, then bump it
//! let mut create = Transaction::new(1);
//! create.write(&partition, ObjectVersion::new(1, 0));
//! assert!(coordinator.execute(&create));
//!
//! let mut bump = Transaction::new(2);
//! bump.read(&partition, ObjectVersion::new(1, 0));
//! bump.write(&partition, ObjectVersion::new(1, 1));
//! assert!(coordinator.execute(&bump));
//!
//! assert_eq!(partition.current_version(1), 1);
//! ```
//!
//! ## Crates
//!
//! - `vershard-core`: ids, [`ObjectVersion`], version table, settlement
//! - `vershard-locking`: per-object locks with sorted batch acquisition
//! - `vershard-buffer`: the dependency buffer
//! - `vershard-store`: the [`Partition`] admission engine
//! - `vershard-coordinator`: [`Coordinator`], transactions, workload

#![warn(missing_docs)]

pub mod prelude;

pub use vershard_buffer::{AddOutcome, DependencyBuffer, ReadyTxn};
pub use vershard_coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorMetrics, CoordinatorSnapshot, Directory,
    PartitionOps, PreparePolicy, Transaction, VersionCache, WorkloadConfig, WorkloadGenerator,
};
pub use vershard_core::{
    settlement, Error, ObjectId, ObjectVersion, PartitionId, Result, Settlement, Ticket, TxnId,
    Version, VersionMap,
};
pub use vershard_locking::{LockHolders, LockTable, ObjectLock};
pub use vershard_store::{Partition, PartitionMetrics, PartitionSnapshot};
