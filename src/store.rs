//! In-memory entity store backing the CRUD resource.
//!
//! The demo resource mirrors what the chaos scenarios run alongside: a tiny
//! id/name/description record set with create, read, update, delete, and a
//! case-insensitive name search. State lives for the process lifetime only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Fields accepted when creating or updating an entity; the id is assigned by
/// the store.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub struct EntityStore {
    entries: RwLock<HashMap<u64, Entity>>,
    next_id: AtomicU64,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// All entities, ordered by id.
    pub fn list(&self) -> Vec<Entity> {
        let entries = self.entries.read().expect("entity store lock poisoned");
        let mut all: Vec<Entity> = entries.values().cloned().collect();
        all.sort_by_key(|entity| entity.id);
        all
    }

    pub fn get(&self, id: u64) -> Option<Entity> {
        let entries = self.entries.read().expect("entity store lock poisoned");
        entries.get(&id).cloned()
    }

    pub fn create(&self, input: EntityInput) -> Entity {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entity = Entity {
            id,
            name: input.name,
            description: input.description,
        };
        let mut entries = self.entries.write().expect("entity store lock poisoned");
        entries.insert(id, entity.clone());
        entity
    }

    /// Replace the name and description of an existing entity. Returns `None`
    /// when the id is unknown.
    pub fn update(&self, id: u64, input: EntityInput) -> Option<Entity> {
        let mut entries = self.entries.write().expect("entity store lock poisoned");
        let entity = entries.get_mut(&id)?;
        entity.name = input.name;
        entity.description = input.description;
        Some(entity.clone())
    }

    /// Returns whether an entity with the given id existed and was removed.
    pub fn delete(&self, id: u64) -> bool {
        let mut entries = self.entries.write().expect("entity store lock poisoned");
        entries.remove(&id).is_some()
    }

    /// Case-insensitive substring search over entity names, ordered by id.
    pub fn search_by_name(&self, name: &str) -> Vec<Entity> {
        let needle = name.to_lowercase();
        let entries = self.entries.read().expect("entity store lock poisoned");
        let mut matches: Vec<Entity> = entries
            .values()
            .filter(|entity| entity.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by_key(|entity| entity.id);
        matches
    }

    pub fn count(&self) -> usize {
        let entries = self.entries.read().expect("entity store lock poisoned");
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, description: Option<&str>) -> EntityInput {
        EntityInput {
            name: name.to_string(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let store = EntityStore::new();
        let first = store.create(input("alpha", None));
        let second = store.create(input("beta", Some("second")));

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn get_and_list_round_trip() {
        let store = EntityStore::new();
        let created = store.create(input("alpha", Some("first")));

        assert_eq!(store.get(created.id), Some(created.clone()));
        assert_eq!(store.list(), vec![created]);
        assert_eq!(store.get(999), None);
    }

    #[test]
    fn update_replaces_fields() {
        let store = EntityStore::new();
        let created = store.create(input("alpha", None));

        let updated = store
            .update(created.id, input("renamed", Some("now described")))
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.description.as_deref(), Some("now described"));

        assert!(store.update(999, input("missing", None)).is_none());
    }

    #[test]
    fn delete_removes_only_known_ids() {
        let store = EntityStore::new();
        let created = store.create(input("alpha", None));

        assert!(store.delete(created.id));
        assert!(!store.delete(created.id));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn search_is_case_insensitive_contains() {
        let store = EntityStore::new();
        store.create(input("Payment Service", None));
        store.create(input("payment-gateway", None));
        store.create(input("orders", None));

        let matches = store.search_by_name("PAYMENT");
        assert_eq!(matches.len(), 2);
        assert!(store.search_by_name("missing").is_empty());
    }
}
