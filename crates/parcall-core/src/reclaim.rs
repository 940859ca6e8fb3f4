//! Deferred release of superseded call records
//!
//! When the first call of a group is answered, its siblings are hung up from
//! inside the `Established` handler. Their records must not be destroyed in
//! that same handler: the event being dispatched, or events queued right
//! behind it, may still refer to them. The reclaimer takes ownership of such
//! a record, announces it closed to observers, and schedules its destruction
//! onto a later turn of the owning loop through a [`ReleaseScheduler`].
//!
//! A ticket that comes back on the very turn it was issued is re-scheduled
//! instead of released.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::REJECTED_LOCALLY;
use crate::events::{EventPublisher, ParCallEvent};
use crate::records::CallRecord;
use crate::types::CallId;

/// Handle for one pending release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseTicket(u64);

/// Posts a release ticket onto the next turn of the owning loop
pub trait ReleaseScheduler: Send + fmt::Debug {
    fn schedule(&self, ticket: ReleaseTicket);
}

impl<T> ReleaseScheduler for mpsc::UnboundedSender<T>
where
    T: From<ReleaseTicket> + Send + fmt::Debug,
{
    fn schedule(&self, ticket: ReleaseTicket) {
        if self.send(T::from(ticket)).is_err() {
            warn!("Release loop is gone, {:?} stays pending until shutdown", ticket);
        }
    }
}

impl<T> ReleaseScheduler for mpsc::WeakUnboundedSender<T>
where
    T: From<ReleaseTicket> + Send + fmt::Debug,
{
    fn schedule(&self, ticket: ReleaseTicket) {
        match self.upgrade() {
            Some(tx) => tx.schedule(ticket),
            None => warn!("Release loop is gone, {:?} stays pending until shutdown", ticket),
        }
    }
}

/// Outcome of a completed release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedRecord {
    pub call_id: CallId,
    pub deferred_turn: u64,
    pub released_turn: u64,
}

#[derive(Debug)]
struct PendingRelease {
    record: CallRecord,
    deferred_turn: u64,
}

/// Owner of call records waiting for their deferred destruction
#[derive(Debug)]
pub struct DeferredReclaimer {
    pending: HashMap<ReleaseTicket, PendingRelease>,
    next_ticket: u64,
    scheduler: Box<dyn ReleaseScheduler>,
}

impl DeferredReclaimer {
    pub fn new(scheduler: Box<dyn ReleaseScheduler>) -> Self {
        Self {
            pending: HashMap::new(),
            next_ticket: 0,
            scheduler,
        }
    }

    /// Take ownership of `record`, emit its synthetic close and schedule
    /// its destruction after `turn`
    pub fn defer_release(
        &mut self,
        record: CallRecord,
        turn: u64,
        events: &EventPublisher,
    ) -> ReleaseTicket {
        self.next_ticket += 1;
        let ticket = ReleaseTicket(self.next_ticket);

        events.publish(ParCallEvent::CallClosed {
            call_id: record.call_id().clone(),
            group: record.group_name().to_string(),
            reason: Some(REJECTED_LOCALLY.to_string()),
            synthetic: true,
        });

        debug!(
            "Deferring release of call {} (group {}) from turn {}",
            record.call_id(),
            record.group_name(),
            turn
        );
        self.pending.insert(
            ticket,
            PendingRelease {
                record,
                deferred_turn: turn,
            },
        );
        self.scheduler.schedule(ticket);
        ticket
    }

    /// Destroy the record behind `ticket` if `turn` is later than the turn
    /// it was deferred on. Returns `None` for unknown tickets and for
    /// tickets that had to be pushed to another turn.
    pub fn release(&mut self, ticket: ReleaseTicket, turn: u64) -> Option<ReleasedRecord> {
        let deferred_turn = self.pending.get(&ticket)?.deferred_turn;
        if turn <= deferred_turn {
            debug!("{:?} came back on its deferring turn {}, rescheduling", ticket, turn);
            self.scheduler.schedule(ticket);
            return None;
        }

        let pending = self.pending.remove(&ticket)?;
        let call_id = pending.record.call_id().clone();
        drop(pending.record);

        debug!("Released call record {} on turn {}", call_id, turn);
        Some(ReleasedRecord {
            call_id,
            deferred_turn,
            released_turn: turn,
        })
    }

    pub fn is_pending(&self, call_id: &CallId) -> bool {
        self.pending.values().any(|p| p.record.call_id() == call_id)
    }

    /// Records waiting for release
    pub fn pending(&self) -> impl Iterator<Item = &CallRecord> {
        self.pending.values().map(|p| &p.record)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending record at once; only valid when the loop stops
    pub fn drain(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CallHandle;
    use crate::types::GroupId;

    fn record(id: &str) -> CallRecord {
        CallRecord::new(CallHandle::new(id, "sip:b@x"), GroupId(1), "G", "sip:b@x")
    }

    #[tokio::test]
    async fn test_release_happens_on_a_later_turn() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReleaseTicket>();
        let events = EventPublisher::new(8);
        let mut observer = events.subscribe();
        let mut reclaimer = DeferredReclaimer::new(Box::new(tx));

        let ticket = reclaimer.defer_release(record("b"), 4, &events);
        assert!(reclaimer.is_pending(&CallId::from("b")));
        assert_eq!(rx.recv().await, Some(ticket));

        match observer.recv().await.unwrap() {
            ParCallEvent::CallClosed { call_id, reason, synthetic, .. } => {
                assert_eq!(call_id, CallId::from("b"));
                assert_eq!(reason.as_deref(), Some(REJECTED_LOCALLY));
                assert!(synthetic);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let released = reclaimer.release(ticket, 5).unwrap();
        assert_eq!(released.deferred_turn, 4);
        assert_eq!(released.released_turn, 5);
        assert!(reclaimer.is_empty());
        assert!(reclaimer.release(ticket, 6).is_none());
    }

    #[tokio::test]
    async fn test_same_turn_release_is_rescheduled() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReleaseTicket>();
        let events = EventPublisher::new(8);
        let mut reclaimer = DeferredReclaimer::new(Box::new(tx));

        let ticket = reclaimer.defer_release(record("b"), 7, &events);
        assert_eq!(rx.recv().await, Some(ticket));

        assert!(reclaimer.release(ticket, 7).is_none());
        assert_eq!(reclaimer.len(), 1);
        assert_eq!(rx.recv().await, Some(ticket));

        assert!(reclaimer.release(ticket, 8).is_some());
    }

    #[test]
    fn test_drain() {
        let (tx, _rx) = mpsc::unbounded_channel::<ReleaseTicket>();
        let events = EventPublisher::new(8);
        let mut reclaimer = DeferredReclaimer::new(Box::new(tx));
        reclaimer.defer_release(record("a"), 1, &events);
        reclaimer.defer_release(record("b"), 1, &events);

        assert_eq!(reclaimer.drain(), 2);
        assert!(reclaimer.is_empty());
    }
}
