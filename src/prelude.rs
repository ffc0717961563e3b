//! Convenient imports for vershard.
//!
//! ```
//! use vershard::prelude::*;
//!
//! let partition = Partition::new(0);
//! assert_eq!(partition.current_version(1), 0);
//! ```

// Admission engine
pub use crate::{Partition, PartitionSnapshot};

// Coordination
pub use crate::{Coordinator, CoordinatorConfig, CoordinatorSnapshot, PreparePolicy, Transaction};

// Workload generation
pub use crate::{Directory, WorkloadConfig, WorkloadGenerator};

// Core types
pub use crate::{ObjectId, ObjectVersion, Ticket, TxnId, Version};

// Error handling
pub use crate::{Error, Result};
