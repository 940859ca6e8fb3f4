//! Group-tagged call records
//!
//! A [`CallRecord`] links one live call to the group that spawned it. Records
//! are keyed by call-id in a [`CallRecordTable`] that is independent of the
//! group registry: the group reference is a lookup relation (id plus name),
//! so a group can be removed while the calls it spawned are still racing.

use std::collections::HashMap;

use crate::control::CallHandle;
use crate::error::{ParCallError, ParCallResult};
use crate::types::{CallId, GroupId};

/// Race state of a tracked call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Placed, waiting for an answer
    Dialing,
    /// Answered first; no longer racing
    Established,
}

/// Tracking entry for one call placed on behalf of a group
#[derive(Debug)]
pub struct CallRecord {
    call: CallHandle,
    group_id: GroupId,
    group_name: String,
    /// Canonical peer target the call was placed for
    target: String,
    state: RecordState,
}

impl CallRecord {
    pub fn new(
        call: CallHandle,
        group_id: GroupId,
        group_name: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            call,
            group_id,
            group_name: group_name.into(),
            target: target.into(),
            state: RecordState::Dialing,
        }
    }

    pub fn call_id(&self) -> &CallId {
        self.call.id()
    }

    pub fn call(&self) -> &CallHandle {
        &self.call
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub(crate) fn mark_established(&mut self) {
        self.state = RecordState::Established;
    }

    /// Whether `other` was spawned by the same group
    pub fn is_sibling_of(&self, other: &CallRecord) -> bool {
        self.group_id == other.group_id && self.call_id() != other.call_id()
    }
}

/// Call-id indexed collection of live call records
#[derive(Debug, Default)]
pub struct CallRecordTable {
    records: HashMap<CallId, CallRecord>,
}

impl CallRecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a record; a call-id may only be tracked once
    pub fn insert(&mut self, record: CallRecord) -> ParCallResult<()> {
        if self.records.contains_key(record.call_id()) {
            return Err(ParCallError::DuplicateCallRecord {
                call_id: record.call_id().clone(),
            });
        }
        self.records.insert(record.call_id().clone(), record);
        Ok(())
    }

    pub fn get(&self, call_id: &CallId) -> Option<&CallRecord> {
        self.records.get(call_id)
    }

    pub fn get_mut(&mut self, call_id: &CallId) -> Option<&mut CallRecord> {
        self.records.get_mut(call_id)
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.records.contains_key(call_id)
    }

    pub fn remove(&mut self, call_id: &CallId) -> Option<CallRecord> {
        self.records.remove(call_id)
    }

    /// Call-ids of every other record spawned by the same group as `call_id`
    pub fn sibling_ids(&self, call_id: &CallId) -> Vec<CallId> {
        let Some(record) = self.records.get(call_id) else {
            return Vec::new();
        };
        let mut ids: Vec<CallId> = self
            .records
            .values()
            .filter(|other| other.is_sibling_of(record))
            .map(|other| other.call_id().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Records spawned by the group with the given identity
    pub fn in_group(&self, group_id: GroupId) -> impl Iterator<Item = &CallRecord> {
        self.records.values().filter(move |r| r.group_id == group_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallRecord> {
        self.records.values()
    }

    /// Drop every record, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
