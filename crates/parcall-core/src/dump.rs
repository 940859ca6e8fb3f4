//! Debug snapshot of the coordinator state

use std::fmt;

use crate::records::RecordState;
use crate::types::CallId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    pub name: String,
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSnapshot {
    pub call_id: CallId,
    pub group: String,
    /// The spawning group is no longer registered
    pub group_removed: bool,
    pub peer_uri: String,
    pub state: RecordState,
}

/// Best-effort view of groups, tracked calls and pending releases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugDump {
    pub groups: Vec<GroupSnapshot>,
    pub calls: Vec<CallSnapshot>,
    pub pending: Vec<CallSnapshot>,
}

impl fmt::Display for CallSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {} group {}", self.call_id, self.group)?;
        if self.group_removed {
            write!(f, " (removed)")?;
        }
        write!(f, " peer {}", self.peer_uri)
    }
}

impl fmt::Display for DebugDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parallel call groups")?;
        for group in &self.groups {
            writeln!(f, "Group: {}", group.name)?;
            for peer in &group.peers {
                writeln!(f, "  peer: {}", peer)?;
            }
        }
        writeln!(f)?;

        writeln!(f, "Active calls")?;
        for call in &self.calls {
            writeln!(f, "{}", call)?;
        }
        writeln!(f)?;

        if !self.pending.is_empty() {
            writeln!(f, "Pending release")?;
            for call in &self.pending {
                writeln!(f, "{}", call)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_layout() {
        let dump = DebugDump {
            groups: vec![GroupSnapshot {
                name: "G".to_string(),
                peers: vec!["sip:a@x".to_string(), "sip:b@x".to_string()],
            }],
            calls: vec![CallSnapshot {
                call_id: CallId::from("c1"),
                group: "old".to_string(),
                group_removed: true,
                peer_uri: "sip:a@x".to_string(),
                state: RecordState::Dialing,
            }],
            pending: Vec::new(),
        };

        assert_eq!(
            dump.to_string(),
            "Parallel call groups\n\
             Group: G\n  peer: sip:a@x\n  peer: sip:b@x\n\n\
             Active calls\n  c1 group old (removed) peer sip:a@x\n\n"
        );
    }
}
