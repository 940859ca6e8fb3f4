//! First-answer-wins race resolution
//!
//! Per tracked call the state machine is `Dialing -> Established | Closed`.
//!
//! - `Established(call)`: if the call is tracked, every other record of the
//!   same group is hung up and then handed to the [`DeferredReclaimer`]. The
//!   winner stays tracked.
//! - `Closed(call)`: the call's record is removed. Siblings are untouched.
//!
//! Events arrive one at a time on the coordinator loop, so the first
//! `Established` dequeued is the winner. A later `Established` for a call
//! that already lost finds no record and is ignored; its hangup is in flight.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::HangupPolicy;
use crate::control::CallControl;
use crate::events::{EventPublisher, ParCallEvent};
use crate::reclaim::DeferredReclaimer;
use crate::records::{CallRecord, CallRecordTable, RecordState};
use crate::types::CallId;

/// Outcome of an established event that won a race
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub group: String,
    pub winner: CallId,
    pub superseded: Vec<CallId>,
}

/// Event handler enforcing first-answer-wins per group
#[derive(Debug, Clone)]
pub struct RaceResolver {
    control: Arc<dyn CallControl>,
    policy: HangupPolicy,
}

impl RaceResolver {
    pub fn new(control: Arc<dyn CallControl>, policy: HangupPolicy) -> Self {
        Self { control, policy }
    }

    pub async fn on_established(
        &self,
        call_id: &CallId,
        turn: u64,
        records: &mut CallRecordTable,
        reclaimer: &mut DeferredReclaimer,
        events: &EventPublisher,
    ) -> Option<Resolution> {
        let Some(record) = records.get_mut(call_id) else {
            if reclaimer.is_pending(call_id) {
                warn!("Late answer from superseded call {}, ignored", call_id);
            } else {
                debug!("Call {} is not a parallel call", call_id);
            }
            return None;
        };

        if record.state() == RecordState::Established {
            debug!("Call {} already established", call_id);
            return None;
        }
        record.mark_established();
        let group = record.group_name().to_string();

        let siblings = records.sibling_ids(call_id);
        info!(
            "🏁 Call {} answered first in group {}, superseding {} sibling(s)",
            call_id,
            group,
            siblings.len()
        );

        // Hang up every loser before any record changes hands
        for sibling in &siblings {
            if let Some(record) = records.get(sibling) {
                if let Err(e) = self
                    .control
                    .hangup(record.call(), self.policy.status_code, self.policy.reason.as_deref())
                    .await
                {
                    warn!("Hangup of superseded call {} failed: {}", sibling, e);
                }
            }
        }

        for sibling in &siblings {
            if let Some(record) = records.remove(sibling) {
                reclaimer.defer_release(record, turn, events);
            }
        }

        events.publish(ParCallEvent::RaceWon {
            group: group.clone(),
            call_id: call_id.clone(),
            superseded: siblings.len(),
        });

        Some(Resolution {
            group,
            winner: call_id.clone(),
            superseded: siblings,
        })
    }

    /// Stop tracking a call that is gone. Returns the removed record.
    pub fn on_closed(
        &self,
        call_id: &CallId,
        reason: Option<&str>,
        records: &mut CallRecordTable,
        events: &EventPublisher,
    ) -> Option<CallRecord> {
        let record = records.remove(call_id)?;
        debug!(
            "Call {} of group {} closed: {}",
            call_id,
            record.group_name(),
            reason.unwrap_or("no reason")
        );
        events.publish(ParCallEvent::CallClosed {
            call_id: call_id.clone(),
            group: record.group_name().to_string(),
            reason: reason.map(str::to_string),
            synthetic: false,
        });
        Some(record)
    }
}
