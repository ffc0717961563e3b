//! Transaction coordination across vershard partitions
//!
//! A [`Coordinator`] drives one transaction at a time through the
//! partitions it touches: an optional coordinator-local lock over the
//! full cross-partition object set, prepare on every touched partition
//! (sequentially or concurrently, per [`CoordinatorConfig`]), then
//! commit-all or abort-all. Failed transactions are abandoned — retry
//! policy belongs to the caller, who can rebuild fresh reads from the
//! coordinator's version cache.
//!
//! The [`workload`] module generates random transactions against the
//! coordinator's view of the store, in the shape the benchmark harness
//! consumes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod directory;
pub mod metrics;
pub mod transaction;
pub mod workload;

pub use config::{CoordinatorConfig, PreparePolicy};
pub use coordinator::Coordinator;
pub use directory::{Directory, VersionCache};
pub use metrics::{CoordinatorMetrics, CoordinatorSnapshot};
pub use transaction::{PartitionOps, Transaction};
pub use workload::{WorkloadConfig, WorkloadGenerator};
