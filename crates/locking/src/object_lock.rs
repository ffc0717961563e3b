//! Per-object shared/exclusive lock

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use vershard_core::TxnId;

/// Snapshot of a lock's holders, for inspection in tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolders {
    /// Transaction holding the exclusive lock, if any.
    pub writer: Option<TxnId>,
    /// Transactions holding the shared lock, sorted.
    pub readers: Vec<TxnId>,
}

impl LockHolders {
    /// True iff nothing holds this lock.
    pub fn is_free(&self) -> bool {
        self.writer.is_none() && self.readers.is_empty()
    }
}

#[derive(Debug, Default)]
struct LockState {
    // Invariant: writer and readers are never simultaneously populated.
    writer: Option<TxnId>,
    readers: FxHashSet<TxnId>,
}

/// Try-lock over one object.
///
/// At most one exclusive holder XOR any number of shared holders. All
/// operations run in a single critical section per object, so per-object
/// lock transitions are linearizable. Acquisition never waits: a refusal
/// is reported as `false` and the caller decides what to do.
#[derive(Debug, Default)]
pub struct ObjectLock {
    state: Mutex<LockState>,
}

impl ObjectLock {
    /// Create an unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grab the shared lock for `tid`.
    ///
    /// Granted while no exclusive holder exists — shared holders never
    /// block each other, but a pending writer blocks new readers until it
    /// releases.
    pub fn lock_read(&self, tid: TxnId) -> bool {
        let mut state = self.state.lock();
        if state.writer.is_some() {
            return false;
        }
        state.readers.insert(tid);
        true
    }

    /// Grab the exclusive lock for `tid`. Granted only when nothing else
    /// holds the lock in either mode.
    pub fn lock_write(&self, tid: TxnId) -> bool {
        let mut state = self.state.lock();
        if state.writer.is_some() || !state.readers.is_empty() {
            return false;
        }
        state.writer = Some(tid);
        true
    }

    /// Release `tid`'s shared lock. Releasing a lock `tid` does not hold
    /// is a no-op: speculative releases from abort and conflict paths are
    /// expected.
    pub fn release_read(&self, tid: TxnId) {
        self.state.lock().readers.remove(&tid);
    }

    /// Release `tid`'s exclusive lock. A release by anyone other than the
    /// current holder is a no-op and leaves the holder undisturbed.
    pub fn release_write(&self, tid: TxnId) {
        let mut state = self.state.lock();
        if state.writer == Some(tid) {
            state.writer = None;
        }
    }

    /// True iff any transaction holds this lock in either mode.
    pub fn is_locked(&self) -> bool {
        let state = self.state.lock();
        state.writer.is_some() || !state.readers.is_empty()
    }

    /// Snapshot the current holders.
    pub fn holders(&self) -> LockHolders {
        let state = self.state.lock();
        let mut readers: Vec<TxnId> = state.readers.iter().copied().collect();
        readers.sort_unstable();
        LockHolders {
            writer: state.writer,
            readers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_lock_excludes_everything() {
        let lock = ObjectLock::new();
        assert!(lock.lock_write(1));
        assert!(!lock.lock_write(2));
        assert!(!lock.lock_read(2));

        lock.release_write(1);
        assert!(!lock.is_locked());
        assert!(lock.lock_write(2));
    }

    #[test]
    fn reads_share() {
        let lock = ObjectLock::new();
        assert!(lock.lock_read(1));
        assert!(lock.lock_read(2));
        assert!(lock.lock_read(3));

        // a writer cannot break in while readers hold
        assert!(!lock.lock_write(4));

        lock.release_read(1);
        lock.release_read(2);
        assert!(!lock.lock_write(4), "one reader still holds");
        lock.release_read(3);
        assert!(lock.lock_write(4));
    }

    #[test]
    fn writer_blocks_new_readers() {
        let lock = ObjectLock::new();
        assert!(lock.lock_write(1));
        assert!(!lock.lock_read(2));
        lock.release_write(1);
        assert!(lock.lock_read(2));
    }

    #[test]
    fn release_without_acquire_is_noop() {
        let lock = ObjectLock::new();
        lock.release_read(9);
        lock.release_write(9);
        assert!(!lock.is_locked());

        // a stranger's write release must not evict the real holder
        assert!(lock.lock_write(1));
        lock.release_write(2);
        assert_eq!(lock.holders().writer, Some(1));
    }

    #[test]
    fn holders_snapshot() {
        let lock = ObjectLock::new();
        lock.lock_read(3);
        lock.lock_read(1);
        let h = lock.holders();
        assert_eq!(h.writer, None);
        assert_eq!(h.readers, vec![1, 3]);
        assert!(!h.is_free());
    }
}
