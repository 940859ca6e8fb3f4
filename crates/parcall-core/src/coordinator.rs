//! The parallel call coordinator
//!
//! [`ParallelCallCoordinator`] owns all state of the module: the group
//! registry, the call record table and the deferred reclaimer. It is a plain
//! value with `&mut self` operations and no interior locking; it is meant to
//! be driven by exactly one loop, see [`crate::service`].
//!
//! The loop calls [`ParallelCallCoordinator::begin_turn`] before every
//! message so the reclaimer can tell the turn a release was deferred on from
//! the turn it is executed on.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{MediaDefaults, ParCallConfig};
use crate::control::CallControl;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::dump::{CallSnapshot, DebugDump, GroupSnapshot};
use crate::error::{ParCallError, ParCallResult};
use crate::events::{EventPublisher, ParCallEvent};
use crate::group::{canonical_target, CallGroup, GroupRegistry, Peer};
use crate::identity::IdentityDirectory;
use crate::reclaim::{DeferredReclaimer, ReleaseScheduler, ReleaseTicket, ReleasedRecord};
use crate::records::{CallRecord, CallRecordTable};
use crate::resolver::{RaceResolver, Resolution};
use crate::types::{CallEvent, GroupId, MediaDirection};

/// State and operations of the parallel call module
#[derive(Debug)]
pub struct ParallelCallCoordinator {
    config: ParCallConfig,
    registry: GroupRegistry,
    records: CallRecordTable,
    reclaimer: DeferredReclaimer,
    dispatcher: Dispatcher,
    resolver: RaceResolver,
    control: Arc<dyn CallControl>,
    identities: Arc<dyn IdentityDirectory>,
    events: EventPublisher,
    turn: u64,
}

impl ParallelCallCoordinator {
    /// Create a coordinator. `scheduler` must post release tickets back
    /// into the loop that drives this coordinator.
    pub fn new(
        config: ParCallConfig,
        control: Arc<dyn CallControl>,
        identities: Arc<dyn IdentityDirectory>,
        scheduler: Box<dyn ReleaseScheduler>,
    ) -> ParCallResult<Self> {
        config.validate()?;

        let events = EventPublisher::new(config.event_capacity);
        Ok(Self {
            registry: GroupRegistry::new(),
            records: CallRecordTable::new(),
            reclaimer: DeferredReclaimer::new(scheduler),
            dispatcher: Dispatcher::new(control.clone(), config.supersede.clone()),
            resolver: RaceResolver::new(control.clone(), config.supersede.clone()),
            control,
            identities,
            events,
            turn: 0,
            config,
        })
    }

    /// Start a new loop turn and return its number
    pub fn begin_turn(&mut self) -> u64 {
        self.turn += 1;
        self.turn
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn config(&self) -> &ParCallConfig {
        &self.config
    }

    pub fn media_defaults(&self) -> MediaDefaults {
        self.config.media
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ParCallEvent> {
        self.events.subscribe()
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    pub fn records(&self) -> &CallRecordTable {
        &self.records
    }

    pub fn reclaimer(&self) -> &DeferredReclaimer {
        &self.reclaimer
    }

    pub fn find_group(&self, name: &str) -> ParCallResult<&CallGroup> {
        self.registry.find_group(name)
    }

    pub fn create_group(&mut self, name: &str) -> ParCallResult<GroupId> {
        let id = self.registry.create_group(name)?;
        self.events.publish(ParCallEvent::GroupCreated {
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Remove a group and its peers. Calls it spawned stay tracked.
    pub fn remove_group(&mut self, name: &str) -> ParCallResult<()> {
        let group = self.registry.remove_group(name)?;
        let live = self.records.in_group(group.id()).count();
        if live > 0 {
            debug!("Group {} removed with {} call(s) still tracked", name, live);
        }
        self.events.publish(ParCallEvent::GroupRemoved {
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn clear_groups(&mut self) -> usize {
        let count = self.registry.clear_all();
        self.events.publish(ParCallEvent::GroupsCleared { count });
        count
    }

    /// Add a dial target to a group, returning its canonical target string
    pub fn add_peer(
        &mut self,
        group: &str,
        address: &str,
        display_name: Option<&str>,
    ) -> ParCallResult<String> {
        // Group existence is checked before anything else
        self.registry.find_group(group)?;

        let identity = self
            .identities
            .find_identity(address)
            .ok_or_else(|| ParCallError::unknown_identity(address))?;
        let target = canonical_target(self.identities.as_ref(), &identity, address, display_name)?;
        self.registry
            .find_group_mut(group)?
            .add_peer(Peer::new(target.clone(), identity))?;

        info!("Added {} to parallel call group {}", target, group);
        Ok(target)
    }

    /// Fan out one call per peer of `group`
    pub async fn start_parallel_call(
        &mut self,
        group: &str,
        audio: MediaDirection,
        video: MediaDirection,
    ) -> ParCallResult<DispatchReport> {
        let group = self.registry.find_group(group)?;
        self.dispatcher
            .dispatch(group, audio, video, &mut self.records, &self.events)
            .await
    }

    /// Hang up every tracked call of the registered group `name`.
    /// Records stay tracked until the engine reports the calls closed.
    pub async fn hangup_group(&mut self, name: &str) -> ParCallResult<usize> {
        let group_id = self.registry.find_group(name)?.id();
        let policy = &self.config.group_hangup;

        let mut count = 0;
        for record in self.records.in_group(group_id) {
            if let Err(e) = self
                .control
                .hangup(record.call(), policy.status_code, policy.reason.as_deref())
                .await
            {
                warn!("Hangup of call {} in group {} failed: {}", record.call_id(), name, e);
                continue;
            }
            count += 1;
        }

        info!("Hung up {} call(s) of group {}", count, name);
        Ok(count)
    }

    /// Feed one call engine event through the race resolver
    pub async fn handle_call_event(&mut self, event: CallEvent) -> Option<Resolution> {
        match event {
            CallEvent::Established { call_id } => {
                self.resolver
                    .on_established(
                        &call_id,
                        self.turn,
                        &mut self.records,
                        &mut self.reclaimer,
                        &self.events,
                    )
                    .await
            }
            CallEvent::Closed { call_id, reason } => {
                self.resolver
                    .on_closed(&call_id, reason.as_deref(), &mut self.records, &self.events);
                None
            }
            CallEvent::Progress { call_id } => {
                debug!("Ignoring progress of call {}", call_id);
                None
            }
        }
    }

    /// Execute a release ticket scheduled by the reclaimer
    pub fn reclaim(&mut self, ticket: ReleaseTicket) -> Option<ReleasedRecord> {
        let released = self.reclaimer.release(ticket, self.turn)?;
        self.events.publish(ParCallEvent::RecordReleased {
            call_id: released.call_id.clone(),
            deferred_turn: released.deferred_turn,
            released_turn: released.released_turn,
        });
        Some(released)
    }

    /// Snapshot of groups, tracked calls and pending releases
    pub fn debug_dump(&self) -> DebugDump {
        let groups = self
            .registry
            .iter()
            .map(|g| GroupSnapshot {
                name: g.name().to_string(),
                peers: g.peers().iter().map(|p| p.target().to_string()).collect(),
            })
            .collect();

        let mut calls: Vec<CallSnapshot> = self.records.iter().map(|r| self.snapshot(r)).collect();
        calls.sort_by(|a, b| a.call_id.cmp(&b.call_id));

        let mut pending: Vec<CallSnapshot> =
            self.reclaimer.pending().map(|r| self.snapshot(r)).collect();
        pending.sort_by(|a, b| a.call_id.cmp(&b.call_id));

        DebugDump {
            groups,
            calls,
            pending,
        }
    }

    fn snapshot(&self, record: &CallRecord) -> CallSnapshot {
        CallSnapshot {
            call_id: record.call_id().clone(),
            group: record.group_name().to_string(),
            group_removed: !self.registry.is_registered(record.group_id()),
            peer_uri: record.target().to_string(),
            state: record.state(),
        }
    }

    /// Drop all groups, records and pending releases
    pub fn shutdown(&mut self) {
        let groups = self.registry.clear_all();
        let records = self.records.clear();
        let pending = self.reclaimer.drain();
        info!(
            "Parallel call coordinator stopped: {} group(s), {} call record(s), {} pending release(s) dropped",
            groups, records, pending
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AccountTable;
    use crate::testing::RecordingCallControl;
    use crate::types::CallId;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    fn coordinator(
        control: Arc<RecordingCallControl>,
    ) -> (ParallelCallCoordinator, mpsc::UnboundedReceiver<ReleaseTicket>) {
        let (tx, rx) = mpsc::unbounded_channel::<ReleaseTicket>();
        let identities = AccountTable::from_aors(["sip:me@x"]).unwrap();
        let coordinator = ParallelCallCoordinator::new(
            ParCallConfig::default(),
            control,
            Arc::new(identities),
            Box::new(tx),
        )
        .unwrap();
        (coordinator, rx)
    }

    #[test]
    fn test_add_peer_checks_group_before_identity() {
        let control = Arc::new(RecordingCallControl::new());
        let (mut c, _rx) = coordinator(control);

        assert_eq!(
            c.add_peer("G", "xmpp:a@x", None).unwrap_err(),
            ParCallError::not_found("G")
        );

        c.create_group("G").unwrap();
        assert_eq!(
            c.add_peer("G", "xmpp:a@x", None).unwrap_err(),
            ParCallError::unknown_identity("xmpp:a@x")
        );
        assert_eq!(c.add_peer("G", "a", None).unwrap(), "sip:a@x");
        assert_eq!(
            c.add_peer("G", "sip:a@x", Some("Anna")).unwrap(),
            "\"Anna\" <sip:a@x>"
        );
        assert_eq!(c.find_group("G").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_loser_is_not_destroyed_inside_the_handler() {
        let control = Arc::new(RecordingCallControl::new());
        let (mut c, mut rx) = coordinator(control.clone());
        c.create_group("G").unwrap();
        c.add_peer("G", "sip:a@x", None).unwrap();
        c.add_peer("G", "sip:b@x", None).unwrap();

        c.begin_turn();
        let report = c
            .start_parallel_call("G", MediaDirection::SendRecv, MediaDirection::SendRecv)
            .await
            .unwrap();
        let call_a = report.placed[0].call_id.clone();
        let call_b = report.placed[1].call_id.clone();

        let handler_turn = c.begin_turn();
        let resolution = c.handle_call_event(CallEvent::established(call_a.clone())).await.unwrap();
        assert_eq!(resolution.superseded, vec![call_b.clone()]);

        // Still owned by the reclaimer when the handler has returned
        assert!(c.reclaimer().is_pending(&call_b));
        assert!(!c.records().contains(&call_b));
        assert!(c.records().contains(&call_a));

        let ticket = rx.recv().await.unwrap();
        let released_turn = c.begin_turn();
        let released = c.reclaim(ticket).unwrap();
        assert_eq!(released.call_id, call_b);
        assert_eq!(released.deferred_turn, handler_turn);
        assert_eq!(released.released_turn, released_turn);
        assert_ne!(released.deferred_turn, released.released_turn);
        assert!(c.reclaimer().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_late_answer_from_superseded_call_is_ignored() {
        let control = Arc::new(RecordingCallControl::new());
        let (mut c, _rx) = coordinator(control.clone());
        c.create_group("G").unwrap();
        c.add_peer("G", "sip:a@x", None).unwrap();
        c.add_peer("G", "sip:b@x", None).unwrap();
        let report = c
            .start_parallel_call("G", MediaDirection::SendRecv, MediaDirection::SendRecv)
            .await
            .unwrap();
        let call_a = report.placed[0].call_id.clone();
        let call_b = report.placed[1].call_id.clone();

        c.begin_turn();
        assert!(c.handle_call_event(CallEvent::established(call_a.clone())).await.is_some());
        c.begin_turn();
        assert!(c.handle_call_event(CallEvent::established(call_b.clone())).await.is_none());
        // A repeated answer of the winner changes nothing either
        assert!(c.handle_call_event(CallEvent::established(call_a.clone())).await.is_none());

        assert!(logs_contain("Late answer from superseded call"));
        assert_eq!(control.hangups_for(&call_a), 0);
        assert_eq!(control.hangups_for(&call_b), 1);
    }

    #[tokio::test]
    async fn test_closed_event_removes_record() {
        let control = Arc::new(RecordingCallControl::new());
        let (mut c, _rx) = coordinator(control);
        c.create_group("G").unwrap();
        c.add_peer("G", "sip:a@x", None).unwrap();
        let report = c
            .start_parallel_call("G", MediaDirection::SendRecv, MediaDirection::Inactive)
            .await
            .unwrap();
        let call = report.placed[0].call_id.clone();

        c.handle_call_event(CallEvent::Progress { call_id: call.clone() }).await;
        assert!(c.records().contains(&call));

        c.handle_call_event(CallEvent::closed(call.clone(), Some("Busy"))).await;
        assert!(c.records().is_empty());

        assert!(c
            .handle_call_event(CallEvent::closed(CallId::from("stranger"), None))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_shutdown_drops_everything() {
        let control = Arc::new(RecordingCallControl::new());
        let (mut c, _rx) = coordinator(control);
        c.create_group("G").unwrap();
        c.add_peer("G", "sip:a@x", None).unwrap();
        c.add_peer("G", "sip:b@x", None).unwrap();
        let report = c
            .start_parallel_call("G", MediaDirection::SendRecv, MediaDirection::SendRecv)
            .await
            .unwrap();
        c.begin_turn();
        c.handle_call_event(CallEvent::established(report.placed[0].call_id.clone()))
            .await;

        c.shutdown();
        assert!(c.registry().is_empty());
        assert!(c.records().is_empty());
        assert!(c.reclaimer().is_empty());
    }
}
