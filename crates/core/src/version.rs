//! Authoritative version table
//!
//! Each partition owns one [`VersionMap`]: the last committed version of
//! every object it stores. The dependency buffer holds a shared handle for
//! its admission checks, but only the owning partition's commit path calls
//! [`VersionMap::install`].

use crate::types::{ObjectId, ObjectVersion, Version};
use dashmap::DashMap;

/// Concurrent `oid → version` table.
///
/// Reads are lock-free via DashMap; writes lock only the target shard.
/// An object the table has never seen reads as version 0 — from this
/// partition's perspective the object simply has not been written yet.
#[derive(Debug, Default)]
pub struct VersionMap {
    inner: DashMap<ObjectId, Version>,
}

impl VersionMap {
    /// Create an empty version table.
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Current version of `oid`; 0 if the object is unknown.
    pub fn get(&self, oid: ObjectId) -> Version {
        self.inner.get(&oid).map(|v| *v).unwrap_or(0)
    }

    /// True iff the table has an explicit entry for `oid`.
    pub fn contains(&self, oid: ObjectId) -> bool {
        self.inner.contains_key(&oid)
    }

    /// Install `object.vnum` as the current version of `object.oid`.
    ///
    /// Callers uphold monotonicity: the admission protocol only ever
    /// commits writes at `current + 1`, so versions never move backwards.
    pub fn install(&self, object: ObjectVersion) {
        self.inner.insert(object.oid, object.vnum);
    }

    /// Number of objects with an explicit version entry.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True iff no object has ever been installed.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
