//! One-shot settlement slots
//!
//! A prepare call answers with a [`Ticket`]. Immediate accept/reject paths
//! produce an already-resolved ticket; the buffered path pairs the ticket
//! with a [`Settlement`] kept inside the dependency buffer until the
//! transaction's fate is known. Resolving consumes the settlement, so a
//! slot can settle at most once by construction.
//!
//! The channel underneath is `tokio::sync::oneshot` used purely as a
//! thread-to-thread promise — no async runtime is involved; waiters park
//! on `blocking_recv` from plain worker threads.

use crate::types::ObjectVersion;
use tokio::sync::oneshot;

/// Create a linked settlement/ticket pair for a deferred outcome.
pub fn settlement() -> (Settlement, Ticket) {
    let (tx, rx) = oneshot::channel();
    (
        Settlement { tx },
        Ticket {
            state: TicketState::Pending(rx),
            stale: Vec::new(),
        },
    )
}

/// The resolving half of a deferred transaction outcome.
///
/// Owned by the dependency buffer while the transaction is parked; taken
/// out exactly once when the transaction resolves, is ejected, or is
/// cancelled.
#[derive(Debug)]
pub struct Settlement {
    tx: oneshot::Sender<bool>,
}

impl Settlement {
    /// Deliver the outcome. Consumes the slot; if the ticket holder has
    /// already gone away the outcome is silently dropped.
    pub fn resolve(self, outcome: bool) {
        let _ = self.tx.send(outcome);
    }
}

#[derive(Debug)]
enum TicketState {
    Ready(bool),
    Pending(oneshot::Receiver<bool>),
}

/// The consuming half of a prepare outcome.
///
/// Either already resolved (immediate accept/reject) or pending on a
/// buffered transaction. A ticket whose settlement was dropped without
/// resolving reads as `false` — cancellation, not a panic.
#[derive(Debug)]
pub struct Ticket {
    state: TicketState,
    stale: Vec<ObjectVersion>,
}

impl Ticket {
    /// An already-resolved ticket.
    pub fn ready(outcome: bool) -> Self {
        Ticket {
            state: TicketState::Ready(outcome),
            stale: Vec::new(),
        }
    }

    /// A rejected ticket carrying the authoritative versions that made the
    /// transaction's reads permanently stale. Coordinators fold these into
    /// their version cache before building a replacement transaction.
    pub fn rejected(stale: Vec<ObjectVersion>) -> Self {
        Ticket {
            state: TicketState::Ready(false),
            stale,
        }
    }

    /// True iff the outcome is already available without blocking.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, TicketState::Ready(_))
    }

    /// Authoritative versions reported on a permanent version conflict.
    /// Empty for accepted, buffered, and lock-conflict outcomes.
    pub fn stale_reads(&self) -> &[ObjectVersion] {
        &self.stale
    }

    /// Non-blocking poll. `None` while a buffered transaction is still
    /// undecided; afterwards always the settled outcome.
    pub fn try_wait(&mut self) -> Option<bool> {
        match &mut self.state {
            TicketState::Ready(outcome) => Some(*outcome),
            TicketState::Pending(rx) => match rx.try_recv() {
                Ok(outcome) => {
                    self.state = TicketState::Ready(outcome);
                    Some(outcome)
                }
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.state = TicketState::Ready(false);
                    Some(false)
                }
            },
        }
    }

    /// Block the calling worker thread until the outcome is delivered.
    pub fn wait(self) -> bool {
        match self.state {
            TicketState::Ready(outcome) => outcome,
            TicketState::Pending(rx) => rx.blocking_recv().unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn ready_ticket_resolves_immediately() {
        assert!(Ticket::ready(true).wait());
        assert!(!Ticket::ready(false).wait());
    }

    #[test]
    fn rejected_ticket_carries_stale_versions() {
        let stale = vec![ObjectVersion::new(1, 5)];
        let mut t = Ticket::rejected(stale.clone());
        assert_eq!(t.stale_reads(), &stale[..]);
        assert_eq!(t.try_wait(), Some(false));
    }

    #[test]
    fn settlement_resolves_across_threads() {
        let (slot, ticket) = settlement();
        let handle = thread::spawn(move || ticket.wait());
        thread::sleep(Duration::from_millis(10));
        slot.resolve(true);
        assert!(handle.join().unwrap());
    }

    #[test]
    fn dropped_settlement_reads_as_false() {
        let (slot, ticket) = settlement();
        drop(slot);
        assert!(!ticket.wait());
    }

    #[test]
    fn resolve_after_ticket_dropped_is_silent() {
        let (slot, ticket) = settlement();
        drop(ticket);
        slot.resolve(true); // no panic, outcome discarded
    }

    #[test]
    fn try_wait_transitions_once() {
        let (slot, mut ticket) = settlement();
        assert_eq!(ticket.try_wait(), None);
        slot.resolve(true);
        assert_eq!(ticket.try_wait(), Some(true));
        // settled state is sticky
        assert_eq!(ticket.try_wait(), Some(true));
    }
}
