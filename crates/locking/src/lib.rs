//! Object locking for the vershard admission engine
//!
//! Two-phase locking with deadlock avoidance:
//! - [`ObjectLock`]: per-object shared/exclusive try-lock state machine
//! - [`LockTable`]: batch acquisition in ascending object-id order
//!
//! Acquisition never blocks. Contention surfaces as a `false` grab, and
//! the globally consistent acquisition order is the sole mechanism that
//! keeps concurrent overlapping grabs from circular-waiting.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod object_lock;
pub mod table;

pub use object_lock::{LockHolders, ObjectLock};
pub use table::LockTable;
