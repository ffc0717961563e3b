//! Coordinator configuration
//!
//! Scheduling behavior is an explicit per-coordinator value passed at
//! construction — there is deliberately no process-wide flag.

/// How a coordinator submits prepares to the partitions a transaction
/// touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreparePolicy {
    /// One partition at a time, waiting for each outcome before moving
    /// on; stops at the first refusal.
    #[default]
    Sequential,
    /// All touched partitions at once on scoped threads, then waits for
    /// every outcome.
    Concurrent,
}

/// Per-coordinator configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorConfig {
    /// Prepare scheduling policy.
    pub prepare: PreparePolicy,
}

impl CoordinatorConfig {
    /// Configuration with sequential prepares.
    pub fn sequential() -> Self {
        Self {
            prepare: PreparePolicy::Sequential,
        }
    }

    /// Configuration with concurrent prepares.
    pub fn concurrent() -> Self {
        Self {
            prepare: PreparePolicy::Concurrent,
        }
    }
}
