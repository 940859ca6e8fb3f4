//! Seam towards the call engine
//!
//! The coordinator never dials, negotiates media or sends BYE/CANCEL itself.
//! It asks a [`CallControl`] implementation to place and hang up calls and
//! learns about the outcome from [`crate::types::CallEvent`]s posted back into
//! its loop.
//!
//! ```text
//! ┌──────────────────────────┐      place_call / hangup       ┌──────────────┐
//! │ ParallelCallCoordinator  │ ─────────────────────────────► │ call engine  │
//! │                          │ ◄───────────────────────────── │              │
//! └──────────────────────────┘   CallEvent via CallEventSink  └──────────────┘
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::error::CallControlError;
use crate::identity::LocalIdentity;
use crate::types::{CallId, MediaDirection};

/// The engine's handle for one placed call.
///
/// A call record owns its handle exclusively; dropping the record drops the
/// coordinator's reference to the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle {
    id: CallId,
    peer_uri: String,
}

impl CallHandle {
    pub fn new(id: impl Into<CallId>, peer_uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            peer_uri: peer_uri.into(),
        }
    }

    /// Stable unique identifier of the call
    pub fn id(&self) -> &CallId {
        &self.id
    }

    /// Remote URI the call was placed to
    pub fn peer_uri(&self) -> &str {
        &self.peer_uri
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.peer_uri)
    }
}

/// Call management operations the coordinator consumes.
///
/// Both operations are requests: their effect is reported later through
/// `Established` / `Closed` events, never through the return value. In
/// particular an implementation must not feed events back into the
/// coordinator synchronously from inside these calls; posting them to the
/// coordinator's [`crate::service::CallEventSink`] is fine.
#[async_trait]
pub trait CallControl: Send + Sync + fmt::Debug {
    /// Start an outgoing call from `identity` to `target`
    async fn place_call(
        &self,
        identity: &LocalIdentity,
        target: &str,
        audio: MediaDirection,
        video: MediaDirection,
    ) -> Result<CallHandle, CallControlError>;

    /// Terminate a call. `status_code` 0 leaves the choice to the engine.
    async fn hangup(
        &self,
        call: &CallHandle,
        status_code: u16,
        reason: Option<&str>,
    ) -> Result<(), CallControlError>;
}
