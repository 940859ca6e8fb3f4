//! In-memory call engine for tests and the simulated shell
//!
//! [`RecordingCallControl`] never touches the network. It hands out call ids
//! `call-1`, `call-2`, ... in placement order (or one fixed id, to mimic an
//! engine that reuses ids) and remembers every placement and hangup so tests
//! can assert on them.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::control::{CallControl, CallHandle};
use crate::error::CallControlError;
use crate::identity::LocalIdentity;
use crate::service::CallEventSink;
use crate::types::{CallId, MediaDirection};

/// One `place_call` request that succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedRecord {
    pub call_id: CallId,
    pub identity: String,
    pub target: String,
    pub audio: MediaDirection,
    pub video: MediaDirection,
}

/// One `hangup` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangupRecord {
    pub call_id: CallId,
    pub status_code: u16,
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    fixed_id: Option<CallId>,
    failing: HashSet<String>,
    placed: Vec<PlacedRecord>,
    hangups: Vec<HangupRecord>,
    sink: Option<CallEventSink>,
}

/// Call engine double recording everything it is asked to do
#[derive(Debug, Default)]
pub struct RecordingCallControl {
    state: Mutex<State>,
}

impl RecordingCallControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future placement towards `target` fail
    pub fn fail_target(&self, target: impl Into<String>) {
        self.state.lock().failing.insert(target.into());
    }

    /// Hand out `call_id` for every future placement
    pub fn reuse_call_id(&self, call_id: impl Into<CallId>) {
        self.state.lock().fixed_id = Some(call_id.into());
    }

    /// Post a `Closed` event into `sink` whenever a call is hung up
    pub fn set_event_sink(&self, sink: CallEventSink) {
        self.state.lock().sink = Some(sink);
    }

    pub fn placed(&self) -> Vec<PlacedRecord> {
        self.state.lock().placed.clone()
    }

    pub fn hangups(&self) -> Vec<HangupRecord> {
        self.state.lock().hangups.clone()
    }

    pub fn hangups_for(&self, call_id: &CallId) -> usize {
        self.state
            .lock()
            .hangups
            .iter()
            .filter(|h| &h.call_id == call_id)
            .count()
    }
}

#[async_trait]
impl CallControl for RecordingCallControl {
    async fn place_call(
        &self,
        identity: &LocalIdentity,
        target: &str,
        audio: MediaDirection,
        video: MediaDirection,
    ) -> Result<CallHandle, CallControlError> {
        let mut state = self.state.lock();
        if state.failing.contains(target) {
            return Err(CallControlError::Unreachable {
                reason: format!("{} is not reachable", target),
            });
        }

        state.next_id += 1;
        let call_id = match &state.fixed_id {
            Some(id) => id.clone(),
            None => CallId::new(format!("call-{}", state.next_id)),
        };
        state.placed.push(PlacedRecord {
            call_id: call_id.clone(),
            identity: identity.to_string(),
            target: target.to_string(),
            audio,
            video,
        });
        debug!("Simulated call {} to {}", call_id, target);
        Ok(CallHandle::new(call_id, target))
    }

    async fn hangup(
        &self,
        call: &CallHandle,
        status_code: u16,
        reason: Option<&str>,
    ) -> Result<(), CallControlError> {
        let sink = {
            let mut state = self.state.lock();
            state.hangups.push(HangupRecord {
                call_id: call.id().clone(),
                status_code,
                reason: reason.map(str::to_string),
            });
            state.sink.clone()
        };

        // Queued behind the current turn, never delivered synchronously
        if let Some(sink) = sink {
            let _ = sink.closed(call.id().clone(), reason);
        }
        Ok(())
    }
}
