//! Pending change ledger: one coalesced record per entity id

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Entity;

/// What kind of persistence operation an entity needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Update,
    Remove,
}

/// Entity carried by a change record.
///
/// Removals carry the last value the baseline knew, or a bare id when the
/// engine never saw the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeEntity<T> {
    Full(T),
    Tombstone { id: String },
}

impl<T: Entity> ChangeEntity<T> {
    pub fn id(&self) -> &str {
        match self {
            ChangeEntity::Full(entity) => entity.id(),
            ChangeEntity::Tombstone { id } => id,
        }
    }

    pub fn as_full(&self) -> Option<&T> {
        match self {
            ChangeEntity::Full(entity) => Some(entity),
            ChangeEntity::Tombstone { .. } => None,
        }
    }
}

/// A coalesced pending operation for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange<T> {
    pub change_type: ChangeType,
    pub entity: ChangeEntity<T>,
    /// Diagnostics only; never serialized into a delta.
    pub recorded_at: DateTime<Utc>,
}

impl<T: Entity> PendingChange<T> {
    pub fn new(change_type: ChangeType, entity: ChangeEntity<T>, recorded_at: DateTime<Utc>) -> Self {
        PendingChange {
            change_type,
            entity,
            recorded_at,
        }
    }
}

/// Per-type tally of pending records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeCounts {
    pub adds: usize,
    pub updates: usize,
    pub removes: usize,
}

impl ChangeCounts {
    pub fn total(&self) -> usize {
        self.adds + self.updates + self.removes
    }
}

/// Map from entity id to its single pending change. Later records supersede
/// earlier ones.
#[derive(Debug, Clone)]
pub struct Ledger<T> {
    entries: HashMap<String, PendingChange<T>>,
}

impl<T: Entity> Ledger<T> {
    pub fn new() -> Self {
        Ledger {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&PendingChange<T>> {
        self.entries.get(id)
    }

    pub fn change_type(&self, id: &str) -> Option<ChangeType> {
        self.entries.get(id).map(|change| change.change_type)
    }

    /// Write `change` for `id`, returning whatever it superseded.
    pub fn record(&mut self, id: &str, change: PendingChange<T>) -> Option<PendingChange<T>> {
        self.entries.insert(id.to_string(), change)
    }

    /// Drop the record for `id` if it still matches what was persisted.
    pub fn acknowledge(&mut self, id: &str, change_type: ChangeType, entity: &ChangeEntity<T>) -> bool {
        let matches = self
            .entries
            .get(id)
            .is_some_and(|pending| pending.change_type == change_type && &pending.entity == entity);
        if matches {
            self.entries.remove(id);
        }
        matches
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PendingChange<T>)> {
        self.entries.iter()
    }

    pub fn counts(&self) -> ChangeCounts {
        let mut counts = ChangeCounts::default();
        for change in self.entries.values() {
            match change.change_type {
                ChangeType::Add => counts.adds += 1,
                ChangeType::Update => counts.updates += 1,
                ChangeType::Remove => counts.removes += 1,
            }
        }
        counts
    }
}

impl<T: Entity> Default for Ledger<T> {
    fn default() -> Self {
        Self::new()
    }
}
