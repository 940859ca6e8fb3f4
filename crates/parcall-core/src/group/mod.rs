//! Call groups and their peers
//!
//! A [`CallGroup`] is a named, ordered list of [`Peer`]s. Groups live in the
//! [`GroupRegistry`]; peers live inside their group and go away with it. Call
//! records spawned by a group are tracked elsewhere and survive its removal.

mod peer;
mod registry;

pub use peer::{canonical_target, Peer};
pub use registry::GroupRegistry;

use crate::error::{ParCallError, ParCallResult};
use crate::types::GroupId;

/// A named set of dial targets
#[derive(Debug, Clone)]
pub struct CallGroup {
    id: GroupId,
    name: String,
    peers: Vec<Peer>,
}

impl CallGroup {
    pub(crate) fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            peers: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Peers in the order they were added
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains_target(&self, target: &str) -> bool {
        self.peers.iter().any(|p| p.target() == target)
    }

    /// Append a peer unless its canonical target is already present
    pub fn add_peer(&mut self, peer: Peer) -> ParCallResult<()> {
        if self.contains_target(peer.target()) {
            return Err(ParCallError::duplicate_target(&self.name, peer.target()));
        }
        self.peers.push(peer);
        Ok(())
    }
}
