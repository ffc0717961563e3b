//! Dependency buffering for the vershard admission engine
//!
//! A transaction whose reads reference object versions the partition has
//! not seen yet is not rejected — it is parked in a [`DependencyBuffer`]
//! until the authoritative version catches up (the transaction resolves)
//! or overshoots (the transaction is ejected). Readiness is counted: each
//! buffered transaction tracks how many of its dependencies are still in
//! the future, and the transaction settles exactly once, on whichever
//! thread makes the count reach zero, ejects it, or cancels it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;

pub use buffer::{AddOutcome, DependencyBuffer, ReadyTxn};
