//! Partition (shard) of the vershard object store
//!
//! A [`Partition`] owns the authoritative version table for its objects,
//! an object lock table, and a dependency buffer. It admits transactions
//! through `prepare`, installs their writes through `commit`, and cancels
//! them through `abort`. Every failure is reported to the caller as a
//! `false` outcome — the partition itself never retries anything.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod metrics;
pub mod partition;

pub use metrics::{PartitionMetrics, PartitionSnapshot};
pub use partition::Partition;
