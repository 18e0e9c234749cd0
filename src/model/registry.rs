use std::collections::BTreeMap;

use crate::model::Id;

/// Id-keyed collection of project-scoped entities with an explicit load
/// state. A registry starts unloaded; the owning project materializes it
/// from storage exactly once and marks it loaded. Iteration order is the
/// id order, so listings are deterministic.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: BTreeMap<Id, T>,
    loaded: bool,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            loaded: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replace the contents with a fully materialized set.
    pub fn load(&mut self, entries: BTreeMap<Id, T>) {
        self.entries = entries;
        self.loaded = true;
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert if absent. Returns false when the id was already present,
    /// leaving the existing entry untouched.
    pub fn insert(&mut self, id: Id, value: T) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, value);
        true
    }

    /// Insert or overwrite. Used by saves, where the caller's copy wins.
    pub fn upsert(&mut self, id: Id, value: T) {
        self.entries.insert(id, value);
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.entries.remove(id)
    }

    pub fn ids(&self) -> Vec<Id> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, &T)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Registry<T> {
    pub fn to_map(&self) -> BTreeMap<Id, T> {
        self.entries.clone()
    }
}
