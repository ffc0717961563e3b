//! Object placement and the coordinator's version cache

use dashmap::DashMap;
use vershard_core::{ObjectId, ObjectVersion, Version};

/// Which partition owns each object.
///
/// Shared between coordinators and workload generators; assignment
/// happens when objects are created (the seeding transaction) and never
/// changes afterwards.
#[derive(Debug, Default)]
pub struct Directory {
    inner: DashMap<ObjectId, usize>,
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `oid` lives on the partition at `index`.
    pub fn assign(&self, oid: ObjectId, index: usize) {
        self.inner.insert(oid, index);
    }

    /// Partition index owning `oid`, if known.
    pub fn locate(&self, oid: ObjectId) -> Option<usize> {
        self.inner.get(&oid).map(|i| *i)
    }

    /// All known object ids, in unspecified order.
    pub fn objects(&self) -> Vec<ObjectId> {
        self.inner.iter().map(|e| *e.key()).collect()
    }

    /// Number of known objects.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True iff no object was ever assigned.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// A coordinator's last-seen version per object.
///
/// Fed by its own commits and by stale-read notifications from rejected
/// prepares. Only ever moves forward: a late notification can never drag
/// the cache behind something fresher it already learned.
#[derive(Debug, Default)]
pub struct VersionCache {
    inner: DashMap<ObjectId, Version>,
}

impl VersionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last seen version of `oid`; 0 if never observed.
    pub fn get(&self, oid: ObjectId) -> Version {
        self.inner.get(&oid).map(|v| *v).unwrap_or(0)
    }

    /// Fold an observed version in, keeping the maximum.
    pub fn observe(&self, object: ObjectVersion) {
        self.inner
            .entry(object.oid)
            .and_modify(|v| {
                if *v < object.vnum {
                    *v = object.vnum;
                }
            })
            .or_insert(object.vnum);
    }

    /// Number of objects ever observed.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True iff nothing was ever observed.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_assign_and_locate() {
        let dir = Directory::new();
        assert_eq!(dir.locate(1), None);
        dir.assign(1, 0);
        dir.assign(2, 1);
        assert_eq!(dir.locate(1), Some(0));
        assert_eq!(dir.locate(2), Some(1));
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn cache_never_regresses() {
        let cache = VersionCache::new();
        assert_eq!(cache.get(1), 0);
        cache.observe(ObjectVersion::new(1, 5));
        cache.observe(ObjectVersion::new(1, 3));
        assert_eq!(cache.get(1), 5);
        cache.observe(ObjectVersion::new(1, 6));
        assert_eq!(cache.get(1), 6);
    }
}
