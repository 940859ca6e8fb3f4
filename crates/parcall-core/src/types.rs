//! Shared identifiers and value types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable identifier of one call for its whole lifetime (the SIP Call-ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of one registered call group.
///
/// Allocated fresh every time a group is created, so a group that is removed
/// and created again under the same name gets a new id. Call records compare
/// ids, never names, when they look for siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// SDP media direction requested for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaDirection {
    Inactive,
    SendOnly,
    RecvOnly,
    SendRecv,
}

impl MediaDirection {
    /// SDP attribute name of the direction
    pub fn name(&self) -> &'static str {
        match self {
            MediaDirection::Inactive => "inactive",
            MediaDirection::SendOnly => "sendonly",
            MediaDirection::RecvOnly => "recvonly",
            MediaDirection::SendRecv => "sendrecv",
        }
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self, MediaDirection::Inactive)
    }
}

impl Default for MediaDirection {
    fn default() -> Self {
        MediaDirection::SendRecv
    }
}

impl fmt::Display for MediaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MediaDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inactive" => Ok(MediaDirection::Inactive),
            "sendonly" => Ok(MediaDirection::SendOnly),
            "recvonly" => Ok(MediaDirection::RecvOnly),
            "sendrecv" => Ok(MediaDirection::SendRecv),
            other => Err(format!("Unknown media direction: {}", other)),
        }
    }
}

/// Call state change delivered by the call engine.
///
/// Only `Established` and `Closed` drive the parallel call state machine;
/// everything else is accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// Provisional progress (ringing, early media)
    Progress { call_id: CallId },
    /// The peer answered
    Established { call_id: CallId },
    /// The call is gone
    Closed {
        call_id: CallId,
        reason: Option<String>,
    },
}

impl CallEvent {
    pub fn call_id(&self) -> &CallId {
        match self {
            CallEvent::Progress { call_id }
            | CallEvent::Established { call_id }
            | CallEvent::Closed { call_id, .. } => call_id,
        }
    }

    pub fn established(call_id: impl Into<CallId>) -> Self {
        CallEvent::Established {
            call_id: call_id.into(),
        }
    }

    pub fn closed(call_id: impl Into<CallId>, reason: Option<&str>) -> Self {
        CallEvent::Closed {
            call_id: call_id.into(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_direction_parsing() {
        assert_eq!("sendonly".parse::<MediaDirection>(), Ok(MediaDirection::SendOnly));
        assert_eq!(" RecvOnly ".parse::<MediaDirection>(), Ok(MediaDirection::RecvOnly));
        assert_eq!("inactive".parse::<MediaDirection>(), Ok(MediaDirection::Inactive));
        assert!("sideways".parse::<MediaDirection>().is_err());
        assert_eq!(MediaDirection::default(), MediaDirection::SendRecv);
    }

    #[test]
    fn test_call_event_accessors() {
        let event = CallEvent::closed("abc", Some("Remote hangup"));
        assert_eq!(event.call_id().as_str(), "abc");
        assert_eq!(
            event,
            CallEvent::Closed {
                call_id: CallId::from("abc"),
                reason: Some("Remote hangup".to_string()),
            }
        );
    }
}
