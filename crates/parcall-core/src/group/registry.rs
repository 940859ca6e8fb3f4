use std::collections::BTreeMap;

use tracing::{debug, info};

use super::CallGroup;
use crate::error::{ParCallError, ParCallResult};
use crate::types::GroupId;

/// Registry of call groups keyed by name
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<String, CallGroup>,
    next_id: u64,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty group. Fails without side effects if the name is taken.
    pub fn create_group(&mut self, name: &str) -> ParCallResult<GroupId> {
        if self.groups.contains_key(name) {
            return Err(ParCallError::already_exists(name));
        }

        self.next_id += 1;
        let id = GroupId(self.next_id);
        self.groups.insert(name.to_string(), CallGroup::new(id, name));
        info!("Created parallel call group {} ({})", name, id);
        Ok(id)
    }

    /// Unregister a group and drop its peers
    pub fn remove_group(&mut self, name: &str) -> ParCallResult<CallGroup> {
        let group = self
            .groups
            .remove(name)
            .ok_or_else(|| ParCallError::not_found(name))?;
        info!("Removed parallel call group {} with {} peers", name, group.len());
        Ok(group)
    }

    pub fn find_group(&self, name: &str) -> ParCallResult<&CallGroup> {
        self.groups.get(name).ok_or_else(|| ParCallError::not_found(name))
    }

    pub fn find_group_mut(&mut self, name: &str) -> ParCallResult<&mut CallGroup> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| ParCallError::not_found(name))
    }

    /// Whether `id` still names a registered group
    pub fn is_registered(&self, id: GroupId) -> bool {
        self.groups.values().any(|g| g.id() == id)
    }

    /// Remove every group, returning how many were removed
    pub fn clear_all(&mut self) -> usize {
        let count = self.groups.len();
        self.groups.clear();
        debug!("Cleared {} parallel call groups", count);
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
