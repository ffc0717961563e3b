//! Counting-based dependency buffer
//!
//! # Design
//!
//! - `deps`: every registered waiter per exact object version, including
//!   dependencies already satisfied when the transaction arrived. A later
//!   overwrite of such an object still invalidates the reader, so
//!   satisfied dependencies stay tracked until ejected.
//! - `unresolved`: only the strictly-future dependencies; this is what a
//!   version install drains.
//! - `txns`: per-transaction entry with the unresolved-dependency count
//!   and the settlement slot. Presence of a tid here means the
//!   transaction is buffered and alive.
//! - `gates`: lazily created per-object critical sections. The version
//!   comparison in `add` and the drain in `remove`/`eject` for the same
//!   object are mutually exclusive, which is what makes the
//!   check-then-register step race-free against concurrent installs.
//!
//! Lock order is always object gate → transaction entry, and no path
//! holds two gates at once, so no circular wait is possible.
//!
//! Settlement is exactly-once by construction: the slot is an owned value
//! taken out of the entry under its mutex, and whichever path takes it —
//! resolution, ejection, cancellation — is the only one that can resolve.

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use vershard_core::{settlement, ObjectId, ObjectVersion, Settlement, Ticket, TxnId, VersionMap};

/// Outcome of [`DependencyBuffer::add`].
#[derive(Debug)]
pub enum AddOutcome {
    /// A dependency was already superseded: the transaction is dead, no
    /// buffer state survives, and the caller reports `false`.
    Rejected,
    /// Every dependency is satisfied (possibly resolved mid-call): the
    /// caller should attempt its lock grab and resolve synchronously.
    Ready,
    /// At least one dependency is still in the future; the ticket settles
    /// when the last one resolves, the transaction is ejected, or it is
    /// cancelled.
    Buffered(Ticket),
}

/// A buffered transaction whose last dependency just resolved.
///
/// The buffer hands the settlement back to the partition, which attempts
/// the lock grab and resolves with its result.
#[derive(Debug)]
pub struct ReadyTxn {
    /// The transaction whose dependencies are all satisfied.
    pub tid: TxnId,
    /// Its settlement slot, taken out of the buffer.
    pub slot: Settlement,
}

#[derive(Debug)]
struct TxnEntry {
    /// Number of dependencies still strictly in the future.
    pending: usize,
    /// False while `add` is still scanning: a count that reaches zero
    /// before arming is left for `add`'s final re-check, so a concurrent
    /// drain can neither lose nor duplicate the settlement.
    armed: bool,
    /// Settlement slot; `None` once some path has taken it.
    slot: Option<Settlement>,
}

/// Tracks transactions waiting on not-yet-current object versions and
/// settles them as the authoritative version advances.
#[derive(Debug)]
pub struct DependencyBuffer {
    versions: Arc<VersionMap>,
    deps: DashMap<ObjectVersion, FxHashSet<TxnId>>,
    unresolved: DashMap<ObjectVersion, FxHashSet<TxnId>>,
    txns: DashMap<TxnId, Arc<Mutex<TxnEntry>>>,
    gates: DashMap<ObjectId, Arc<Mutex<()>>>,
}

impl DependencyBuffer {
    /// Create a buffer reading authoritative versions from `versions`.
    pub fn new(versions: Arc<VersionMap>) -> Self {
        Self {
            versions,
            deps: DashMap::new(),
            unresolved: DashMap::new(),
            txns: DashMap::new(),
            gates: DashMap::new(),
        }
    }

    fn gate(&self, oid: ObjectId) -> Arc<Mutex<()>> {
        self.gates
            .entry(oid)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Register `tid` with its dependency set.
    ///
    /// Each dependency is compared against the authoritative version under
    /// that object's gate:
    /// - already superseded → the whole call unwinds and reports
    ///   [`AddOutcome::Rejected`];
    /// - still in the future → registered as unresolved, count bumped;
    /// - exactly current → tracked for later ejection only.
    pub fn add(
        &self,
        tid: TxnId,
        deps: impl IntoIterator<Item = ObjectVersion>,
    ) -> AddOutcome {
        let (slot, ticket) = settlement();
        let entry = Arc::new(Mutex::new(TxnEntry {
            pending: 0,
            armed: false,
            slot: Some(slot),
        }));
        self.txns.insert(tid, Arc::clone(&entry));

        let mut registered: Vec<ObjectVersion> = Vec::new();
        for dep in deps {
            let gate = self.gate(dep.oid);
            let guard = gate.lock();
            let current = self.versions.get(dep.oid);

            if current > dep.vnum {
                drop(guard);
                tracing::debug!(tid, dep = %dep, current, "superseded while buffering");
                self.unwind(tid, &registered);
                return AddOutcome::Rejected;
            }

            {
                let mut state = entry.lock();
                if state.slot.is_none() {
                    // Ejected or cancelled mid-scan; the ticket already
                    // reads false, nothing further to register.
                    return AddOutcome::Buffered(ticket);
                }
                if current < dep.vnum {
                    state.pending += 1;
                }
            }
            self.deps.entry(dep).or_default().insert(tid);
            if current < dep.vnum {
                self.unresolved.entry(dep).or_default().insert(tid);
            }
            registered.push(dep);
        }

        // Arm and re-check: a dependency may have resolved while the scan
        // was still running, so the buffered-vs-ready decision is made
        // atomically against the final count.
        let ready = {
            let mut state = entry.lock();
            state.armed = true;
            if state.slot.is_some() && state.pending == 0 {
                state.slot.take()
            } else {
                None
            }
        };
        match ready {
            Some(_slot) => {
                // Dropping the pair: the caller resolves synchronously on
                // its own immediate path.
                self.txns.remove(&tid);
                AddOutcome::Ready
            }
            None => AddOutcome::Buffered(ticket),
        }
    }

    /// A write just made `object` current: drain every transaction whose
    /// unresolved dependency was exactly `object`, decrement counts, and
    /// return the transactions whose count reached zero. The caller
    /// performs the lock grab for each and resolves its settlement.
    pub fn remove(&self, object: ObjectVersion) -> Vec<ReadyTxn> {
        let gate = self.gate(object.oid);
        let _guard = gate.lock();

        let waiters = match self.unresolved.remove(&object) {
            Some((_, set)) => set,
            None => return Vec::new(),
        };

        let mut ready = Vec::new();
        for tid in waiters {
            let entry = match self.txns.get(&tid) {
                Some(e) => Arc::clone(e.value()),
                None => continue,
            };
            let mut state = entry.lock();
            if state.slot.is_none() {
                continue;
            }
            state.pending = state.pending.saturating_sub(1);
            if state.pending == 0 && state.armed {
                if let Some(slot) = state.slot.take() {
                    drop(state);
                    self.txns.remove(&tid);
                    ready.push(ReadyTxn { tid, slot });
                }
            }
        }
        ready
    }

    /// A write made `object` current, permanently invalidating every
    /// transaction still waiting on a strictly older version of the same
    /// object. Each such transaction settles `false` here. Returns the
    /// number ejected.
    pub fn eject(&self, object: ObjectVersion) -> usize {
        let gate = self.gate(object.oid);
        let _guard = gate.lock();

        let stale: Vec<ObjectVersion> = self
            .deps
            .iter()
            .map(|e| *e.key())
            .filter(|d| d.older(&object))
            .collect();

        let mut ejected = 0;
        for dep in stale {
            if let Some((_, tids)) = self.deps.remove(&dep) {
                for tid in tids {
                    let entry = match self.txns.get(&tid) {
                        Some(e) => Arc::clone(e.value()),
                        None => continue,
                    };
                    let slot = entry.lock().slot.take();
                    self.txns.remove(&tid);
                    if let Some(slot) = slot {
                        tracing::debug!(tid, dep = %dep, now = %object, "ejecting stale waiter");
                        slot.resolve(false);
                        ejected += 1;
                    }
                }
            }
            self.unresolved.remove(&dep);
        }
        ejected
    }

    /// Cancel `tid` (partition-initiated abort). If still buffered, its
    /// settlement resolves `false`. Idempotent: cancelling an absent or
    /// already-settled transaction is a no-op.
    pub fn delete(&self, tid: TxnId) {
        if let Some((_, entry)) = self.txns.remove(&tid) {
            let slot = entry.lock().slot.take();
            if let Some(slot) = slot {
                tracing::debug!(tid, "cancelling buffered transaction");
                slot.resolve(false);
            }
        }
    }

    /// True iff `tid` is currently buffered and alive.
    pub fn contains(&self, tid: TxnId) -> bool {
        self.txns.contains_key(&tid)
    }

    /// Number of currently buffered transactions.
    pub fn len(&self) -> usize {
        self.txns.len()
    }

    /// True iff no transaction is buffered.
    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    /// Number of transactions registered against exactly `object`
    /// (satisfied and unresolved alike).
    pub fn waiters_on(&self, object: ObjectVersion) -> usize {
        self.deps.get(&object).map(|s| s.len()).unwrap_or(0)
    }

    fn unwind(&self, tid: TxnId, registered: &[ObjectVersion]) {
        for dep in registered {
            let gate = self.gate(dep.oid);
            let _guard = gate.lock();
            Self::forget(&self.deps, dep, tid);
            Self::forget(&self.unresolved, dep, tid);
        }
        self.txns.remove(&tid);
    }

    fn forget(map: &DashMap<ObjectVersion, FxHashSet<TxnId>>, dep: &ObjectVersion, tid: TxnId) {
        if let Some(mut set) = map.get_mut(dep) {
            set.remove(&tid);
            let empty = set.is_empty();
            drop(set);
            if empty {
                map.remove_if(dep, |_, s| s.is_empty());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(versions: &[(u64, u64)]) -> (DependencyBuffer, Arc<VersionMap>) {
        let map = Arc::new(VersionMap::new());
        for &(oid, vnum) in versions {
            map.install(ObjectVersion::new(oid, vnum));
        }
        (DependencyBuffer::new(Arc::clone(&map)), map)
    }

    fn ov(oid: u64, vnum: u64) -> ObjectVersion {
        ObjectVersion::new(oid, vnum)
    }

    #[test]
    fn satisfied_dependencies_are_ready() {
        let (buf, _) = buffer_with(&[(1, 2)]);
        match buf.add(10, [ov(1, 2)]) {
            AddOutcome::Ready => {}
            other => panic!("expected Ready, got {other:?}"),
        }
        assert!(buf.is_empty());
        // satisfied dependency stays tracked for later ejection
        assert_eq!(buf.waiters_on(ov(1, 2)), 1);
    }

    #[test]
    fn forward_dependency_buffers_until_removed() {
        let (buf, versions) = buffer_with(&[(1, 0)]);
        let ticket = match buf.add(10, [ov(1, 1)]) {
            AddOutcome::Buffered(t) => t,
            other => panic!("expected Buffered, got {other:?}"),
        };
        assert!(buf.contains(10));
        assert_eq!(buf.len(), 1);

        versions.install(ov(1, 1));
        let ready = buf.remove(ov(1, 1));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].tid, 10);
        assert!(buf.is_empty());

        // the partition would grab locks here; settle success directly
        ready.into_iter().next().unwrap().slot.resolve(true);
        assert!(ticket.wait());
    }

    #[test]
    fn superseded_dependency_rejects_and_leaves_nothing() {
        let (buf, _) = buffer_with(&[(1, 0), (2, 5)]);
        // first dep registers, second is already superseded
        match buf.add(10, vec![ov(1, 1), ov(2, 3)]) {
            AddOutcome::Rejected => {}
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert!(buf.is_empty());
        assert_eq!(buf.waiters_on(ov(1, 1)), 0, "partial bookkeeping unwound");
    }

    #[test]
    fn eject_aborts_older_waiters() {
        let (buf, versions) = buffer_with(&[(1, 0)]);
        let ticket = match buf.add(10, [ov(1, 1)]) {
            AddOutcome::Buffered(t) => t,
            other => panic!("expected Buffered, got {other:?}"),
        };

        // version 2 lands without 1 ever becoming current
        versions.install(ov(1, 2));
        assert_eq!(buf.eject(ov(1, 2)), 1);
        assert!(buf.is_empty());
        assert!(!ticket.wait());
    }

    #[test]
    fn eject_hits_satisfied_dependency() {
        // A dependency satisfied at add time is still tracked: when a
        // newer version lands, the transaction holding it gets ejected.
        let (buf, versions) = buffer_with(&[(1, 5), (2, 0)]);
        let ticket = match buf.add(10, vec![ov(1, 5), ov(2, 1)]) {
            AddOutcome::Buffered(t) => t,
            other => panic!("expected Buffered, got {other:?}"),
        };

        versions.install(ov(1, 6));
        assert_eq!(buf.eject(ov(1, 6)), 1);
        assert!(buf.is_empty());
        assert!(!ticket.wait());
    }

    #[test]
    fn eject_spares_exact_and_newer_versions() {
        let (buf, _) = buffer_with(&[(1, 0)]);
        let _t1 = buf.add(10, [ov(1, 2)]);
        assert_eq!(buf.eject(ov(1, 2)), 0, "exact version is not older");
        assert!(buf.contains(10));
    }

    #[test]
    fn partial_count_only_settles_once_all_resolve() {
        let (buf, versions) = buffer_with(&[(1, 0), (2, 0)]);
        let mut ticket = match buf.add(10, vec![ov(1, 1), ov(2, 1)]) {
            AddOutcome::Buffered(t) => t,
            other => panic!("expected Buffered, got {other:?}"),
        };

        versions.install(ov(1, 1));
        assert!(buf.remove(ov(1, 1)).is_empty(), "one dependency left");
        assert_eq!(ticket.try_wait(), None);
        assert!(buf.contains(10));

        versions.install(ov(2, 1));
        let ready = buf.remove(ov(2, 1));
        assert_eq!(ready.len(), 1);
        ready.into_iter().next().unwrap().slot.resolve(true);
        assert_eq!(ticket.try_wait(), Some(true));
    }

    #[test]
    fn delete_is_idempotent() {
        let (buf, _) = buffer_with(&[(1, 0)]);
        let ticket = match buf.add(10, [ov(1, 1)]) {
            AddOutcome::Buffered(t) => t,
            other => panic!("expected Buffered, got {other:?}"),
        };

        buf.delete(10);
        buf.delete(10); // second delete: silent no-op
        assert!(!ticket.wait());
        assert!(buf.is_empty());

        // delete after natural resolution is also a no-op
        buf.delete(10);
    }

    #[test]
    fn delete_after_resolution_does_not_double_settle() {
        let (buf, versions) = buffer_with(&[(1, 0)]);
        let ticket = match buf.add(10, [ov(1, 1)]) {
            AddOutcome::Buffered(t) => t,
            other => panic!("expected Buffered, got {other:?}"),
        };

        versions.install(ov(1, 1));
        let ready = buf.remove(ov(1, 1));
        ready.into_iter().next().unwrap().slot.resolve(true);

        buf.delete(10);
        assert!(ticket.wait(), "delete must not override the resolution");
    }

    #[test]
    fn concurrent_remove_and_delete_settle_exactly_once() {
        use std::sync::Barrier;
        use std::thread;

        for _ in 0..50 {
            let (buf, versions) = buffer_with(&[(1, 0)]);
            let buf = Arc::new(buf);
            let ticket = match buf.add(10, [ov(1, 1)]) {
                AddOutcome::Buffered(t) => t,
                other => panic!("expected Buffered, got {other:?}"),
            };

            versions.install(ov(1, 1));
            let barrier = Arc::new(Barrier::new(2));

            let remover = {
                let buf = Arc::clone(&buf);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for r in buf.remove(ov(1, 1)) {
                        r.slot.resolve(true);
                    }
                })
            };
            let deleter = {
                let buf = Arc::clone(&buf);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    buf.delete(10);
                })
            };
            remover.join().unwrap();
            deleter.join().unwrap();

            // whichever path won, the ticket settled exactly once and the
            // buffer is empty
            let _ = ticket.wait();
            assert!(buf.is_empty());
        }
    }
}
