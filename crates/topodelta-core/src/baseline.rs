//! Last-known-committed copy of every tracked entity

use std::collections::HashMap;

use crate::model::Entity;

/// Id-keyed store of the state the engine believes is committed.
///
/// Holds no decision logic: puts and removes are immediate and unconditional.
#[derive(Debug, Clone)]
pub struct Baseline<T> {
    entries: HashMap<String, T>,
}

impl<T: Entity> Baseline<T> {
    pub fn new() -> Self {
        Baseline {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Store `entity` under its own id.
    pub fn put(&mut self, entity: T) {
        self.entries.insert(entity.id().to_string(), entity);
    }

    /// Store `entity` under an explicit id.
    pub fn put_as(&mut self, id: &str, entity: T) {
        self.entries.insert(id.to_string(), entity);
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.entries.remove(id)
    }

    /// Replace the whole store.
    pub fn replace_all(&mut self, entities: impl IntoIterator<Item = T>) {
        self.entries.clear();
        for entity in entities {
            self.put(entity);
        }
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

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}

impl<T: Entity> Default for Baseline<T> {
    fn default() -> Self {
        Self::new()
    }
}
