//! Mutation classification for one entity type

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::baseline::Baseline;
use crate::compare::TransientFields;
use crate::ledger::{ChangeEntity, ChangeType, Ledger, PendingChange};
use crate::model::Entity;

/// Baseline plus ledger for one entity type. Every `track_*` call updates
/// both synchronously.
#[derive(Debug, Clone)]
pub struct EntityTracker<T> {
    baseline: Baseline<T>,
    ledger: Ledger<T>,
}

impl<T: Entity> EntityTracker<T> {
    pub fn new() -> Self {
        EntityTracker {
            baseline: Baseline::new(),
            ledger: Ledger::new(),
        }
    }

    pub fn baseline(&self) -> &Baseline<T> {
        &self.baseline
    }

    pub fn ledger(&self) -> &Ledger<T> {
        &self.ledger
    }

    /// Record an add. Supersedes anything pending, including a remove.
    pub fn track_add(&mut self, entity: T, now: DateTime<Utc>) {
        let id = entity.id().to_string();
        let previous = self.ledger.record(
            &id,
            PendingChange::new(ChangeType::Add, ChangeEntity::Full(entity.clone()), now),
        );
        self.baseline.put(entity);
        debug!(
            "{} {} tracked as add (superseded {:?})",
            T::LABEL,
            id,
            previous.map(|p| p.change_type)
        );
    }

    /// Record an update, returning the change type now pending for `id`, or
    /// `None` when the call was a no-op. An entity whose own id is not `id`
    /// is refused: nothing is recorded.
    pub fn track_update(
        &mut self,
        id: &str,
        next: T,
        transient: &TransientFields,
        now: DateTime<Utc>,
    ) -> Option<ChangeType> {
        if next.id() != id {
            warn!(
                "{} update for {} carries id {}, ignoring",
                T::LABEL,
                id,
                next.id()
            );
            return None;
        }

        let Some(previous) = self.baseline.get(id) else {
            // Never seen by this engine: persist it as new.
            self.ledger.record(
                id,
                PendingChange::new(ChangeType::Add, ChangeEntity::Full(next.clone()), now),
            );
            self.baseline.put_as(id, next);
            debug!("{} {} unknown to baseline, tracked as add", T::LABEL, id);
            return Some(ChangeType::Add);
        };

        if !previous.meaningfully_differs(&next, transient) {
            return None;
        }

        let change_type = match self.ledger.change_type(id) {
            // An unsaved add stays an add.
            Some(ChangeType::Add) => ChangeType::Add,
            _ => ChangeType::Update,
        };
        self.ledger.record(
            id,
            PendingChange::new(change_type, ChangeEntity::Full(next.clone()), now),
        );
        self.baseline.put_as(id, next);
        debug!("{} {} tracked as {:?}", T::LABEL, id, change_type);
        Some(change_type)
    }

    /// Record a removal. Supersedes anything pending, including an add.
    pub fn track_remove(&mut self, id: &str, now: DateTime<Utc>) {
        let entity = match self.baseline.remove(id) {
            Some(last_known) => ChangeEntity::Full(last_known),
            None => ChangeEntity::Tombstone { id: id.to_string() },
        };
        self.ledger
            .record(id, PendingChange::new(ChangeType::Remove, entity, now));
        debug!("{} {} tracked as remove", T::LABEL, id);
    }

    /// Diff two full arrays and route each difference through the
    /// incremental entry points.
    pub fn track_changes(
        &mut self,
        old: &[T],
        new: &[T],
        transient: &TransientFields,
        now: DateTime<Utc>,
    ) {
        let old_by_id: HashMap<&str, &T> = old.iter().map(|e| (e.id(), e)).collect();
        let new_by_id: HashMap<&str, &T> = new.iter().map(|e| (e.id(), e)).collect();

        for entity in new {
            match old_by_id.get(entity.id()) {
                None => self.track_add(entity.clone(), now),
                Some(previous) => {
                    if previous.meaningfully_differs(entity, transient) {
                        self.track_update(entity.id(), entity.clone(), transient, now);
                    }
                }
            }
        }

        for entity in old {
            if !new_by_id.contains_key(entity.id()) {
                self.track_remove(entity.id(), now);
            }
        }
    }

    /// Swap in a new baseline and drop every pending record.
    pub fn rebaseline(&mut self, entities: impl IntoIterator<Item = T>) {
        self.baseline.replace_all(entities);
        self.ledger.clear();
    }

    pub fn clear_ledger(&mut self) {
        self.ledger.clear();
    }

    pub fn acknowledge(&mut self, id: &str, change_type: ChangeType, entity: &ChangeEntity<T>) -> bool {
        self.ledger.acknowledge(id, change_type, entity)
    }

    pub fn reset(&mut self) {
        self.baseline.clear();
        self.ledger.clear();
    }
}

impl<T: Entity> Default for EntityTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}
