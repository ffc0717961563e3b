//! Core types for the vershard admission engine
//!
//! This crate defines the vocabulary shared by every other crate:
//! - [`ObjectVersion`]: an object id paired with a version number
//! - [`VersionMap`]: the authoritative per-partition version table
//! - [`Settlement`] / [`Ticket`]: one-shot deferred result slots
//! - [`Error`] / [`Result`]: configuration and harness errors
//!
//! Transaction outcomes are plain booleans carried by tickets; the error
//! type never models an aborted transaction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod settle;
pub mod types;
pub mod version;

pub use error::{Error, Result};
pub use settle::{settlement, Settlement, Ticket};
pub use types::{ObjectId, ObjectVersion, PartitionId, TxnId, Version};
pub use version::VersionMap;
