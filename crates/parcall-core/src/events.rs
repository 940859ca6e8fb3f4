//! Observer events
//!
//! Everything the coordinator does is published as a [`ParCallEvent`] on a
//! `tokio::sync::broadcast` channel. Observers (UIs, logs, tests) subscribe
//! through [`crate::service::ParallelCallHandle::subscribe`]. Publishing with
//! no subscriber is not an error.

use std::fmt;

use tokio::sync::broadcast;

use crate::types::{CallId, MediaDirection};

/// Events published by the parallel call coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParCallEvent {
    GroupCreated {
        name: String,
    },
    GroupRemoved {
        name: String,
    },
    GroupsCleared {
        count: usize,
    },
    /// A call towards one peer was placed and is now tracked
    CallPlaced {
        group: String,
        call_id: CallId,
        target: String,
        audio: MediaDirection,
        video: MediaDirection,
    },
    /// The call engine refused one peer of a fan-out
    PlacementFailed {
        group: String,
        target: String,
        reason: String,
    },
    /// `call_id` answered first; `superseded` siblings were hung up
    RaceWon {
        group: String,
        call_id: CallId,
        superseded: usize,
    },
    /// A tracked call is gone. `synthetic` marks the notification sent for
    /// calls that lost the race, before the engine reports them closed.
    CallClosed {
        call_id: CallId,
        group: String,
        reason: Option<String>,
        synthetic: bool,
    },
    /// A superseded call record was destroyed on a later loop turn
    RecordReleased {
        call_id: CallId,
        deferred_turn: u64,
        released_turn: u64,
    },
}

impl fmt::Display for ParCallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParCallEvent::GroupCreated { name } => write!(f, "group {} created", name),
            ParCallEvent::GroupRemoved { name } => write!(f, "group {} removed", name),
            ParCallEvent::GroupsCleared { count } => write!(f, "{} group(s) cleared", count),
            ParCallEvent::CallPlaced {
                group,
                call_id,
                target,
                audio,
                video,
            } => write!(
                f,
                "{}: call {} to {} placed (audio={} video={})",
                group, call_id, target, audio, video
            ),
            ParCallEvent::PlacementFailed { group, target, reason } => {
                write!(f, "{}: call to {} failed: {}", group, target, reason)
            }
            ParCallEvent::RaceWon {
                group,
                call_id,
                superseded,
            } => write!(
                f,
                "{}: call {} answered first, {} sibling(s) superseded",
                group, call_id, superseded
            ),
            ParCallEvent::CallClosed {
                call_id,
                group,
                reason,
                synthetic,
            } => {
                write!(f, "{}: call {} closed", group, call_id)?;
                if let Some(reason) = reason {
                    write!(f, " ({})", reason)?;
                }
                if *synthetic {
                    write!(f, " [local]")?;
                }
                Ok(())
            }
            ParCallEvent::RecordReleased {
                call_id,
                deferred_turn,
                released_turn,
            } => write!(
                f,
                "call {} released on turn {} (deferred on turn {})",
                call_id, released_turn, deferred_turn
            ),
        }
    }
}

/// Sender side of the observer channel
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<ParCallEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ParCallEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ParCallEvent> {
        self.tx.subscribe()
    }
}
