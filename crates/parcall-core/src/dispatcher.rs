//! Fan-out of one outbound call per peer
//!
//! The dispatcher walks a group's peers in order and asks the call engine to
//! place a call to each. A peer that cannot be dialed is logged and skipped;
//! every call that was placed is tagged with the group right away. A call
//! whose id is already tracked cannot be tagged; it is hung up with the
//! supersede policy and counted as a failure.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::HangupPolicy;
use crate::control::{CallControl, CallHandle};
use crate::error::{ParCallError, ParCallResult};
use crate::events::{EventPublisher, ParCallEvent};
use crate::group::CallGroup;
use crate::records::{CallRecord, CallRecordTable};
use crate::types::{CallId, MediaDirection};

/// One call that was placed by a fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedCall {
    pub call_id: CallId,
    pub target: String,
}

/// Result of one parallel call request.
///
/// Callers must not assume every peer was dialed: `failed` lists the peers
/// that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub group: String,
    pub audio: MediaDirection,
    pub video: MediaDirection,
    pub placed: Vec<PlacedCall>,
    pub failed: Vec<ParCallError>,
}

impl DispatchReport {
    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Places the calls of a parallel call group
#[derive(Debug, Clone)]
pub struct Dispatcher {
    control: Arc<dyn CallControl>,
    /// Applied to placed calls that cannot be tracked
    policy: HangupPolicy,
}

impl Dispatcher {
    pub fn new(control: Arc<dyn CallControl>, policy: HangupPolicy) -> Self {
        Self { control, policy }
    }

    /// Reject a request that would not exchange any media
    pub fn validate_directions(audio: MediaDirection, video: MediaDirection) -> ParCallResult<()> {
        if audio.is_inactive() && video.is_inactive() {
            return Err(ParCallError::InvalidDirection);
        }
        Ok(())
    }

    /// Place one call per peer of `group` and track each placed call.
    ///
    /// Placement failures never abort the fan-out. An empty group yields an
    /// empty report.
    pub async fn dispatch(
        &self,
        group: &CallGroup,
        audio: MediaDirection,
        video: MediaDirection,
        records: &mut CallRecordTable,
        events: &EventPublisher,
    ) -> ParCallResult<DispatchReport> {
        Self::validate_directions(audio, video)?;

        let mut report = DispatchReport {
            group: group.name().to_string(),
            audio,
            video,
            ..Default::default()
        };

        for peer in group.peers() {
            let placed = self
                .control
                .place_call(peer.identity(), peer.target(), audio, video)
                .await
                .map_err(|e| ParCallError::placement_failed(peer.target(), e.to_string()));

            let outcome = match placed {
                Ok(call) if records.contains(call.id()) => {
                    self.drop_untracked(&call).await;
                    Err(ParCallError::DuplicateCallRecord {
                        call_id: call.id().clone(),
                    })
                }
                Ok(call) => {
                    let call_id = call.id().clone();
                    records
                        .insert(CallRecord::new(call, group.id(), group.name(), peer.target()))
                        .map(|_| call_id)
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(call_id) => {
                    info!(
                        "parallel call uri: {} id: {} audio={} video={}",
                        peer.target(),
                        call_id,
                        audio,
                        video
                    );
                    events.publish(ParCallEvent::CallPlaced {
                        group: group.name().to_string(),
                        call_id: call_id.clone(),
                        target: peer.target().to_string(),
                        audio,
                        video,
                    });
                    report.placed.push(PlacedCall {
                        call_id,
                        target: peer.target().to_string(),
                    });
                }
                Err(e) => {
                    warn!("Group {}: skipping peer {}: {}", group.name(), peer.target(), e);
                    events.publish(ParCallEvent::PlacementFailed {
                        group: group.name().to_string(),
                        target: peer.target().to_string(),
                        reason: e.to_string(),
                    });
                    report.failed.push(e);
                }
            }
        }

        info!(
            "Parallel call for group {}: {} placed, {} failed",
            group.name(),
            report.placed_count(),
            report.failed_count()
        );
        Ok(report)
    }

    /// Hang up a live call that no record can own
    async fn drop_untracked(&self, call: &CallHandle) {
        warn!("Call engine reused live call-id {}, hanging up the new call", call.id());
        if let Err(e) = self
            .control
            .hangup(call, self.policy.status_code, self.policy.reason.as_deref())
            .await
        {
            warn!("Hangup of untracked call {} failed: {}", call.id(), e);
        }
    }
}
