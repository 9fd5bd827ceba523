use crate::{error::Error, schema::collection::Collection};
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

///
/// SchemaRegistry
///
/// Process-wide registry of collections keyed by name. Read-mostly after
/// startup migration; lookups happen on every request, registrations only
/// at boot, so a read/write lock is the right shape.
///
/// Lookups hand out `Arc<Collection>` snapshots. Request-scoped overrides
/// derive a copy (see `CollectionOverlay`); the registered value is never
/// mutated in place.
///

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    collections: RwLock<BTreeMap<String, Arc<Collection>>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection. Duplicate names are rejected.
    pub fn register(&self, collection: Collection) -> Result<(), Error> {
        let mut collections = self.collections.write().expect("registry lock poisoned");

        if collections.contains_key(&collection.name) {
            return Err(Error::exists(format!(
                "collection '{}' already registered",
                collection.name
            )));
        }

        collections.insert(collection.name.clone(), Arc::new(collection));
        Ok(())
    }

    /// Replace or insert a collection unconditionally.
    pub fn put(&self, collection: Collection) {
        self.collections
            .write()
            .expect("registry lock poisoned")
            .insert(collection.name.clone(), Arc::new(collection));
    }

    /// Look up a collection by name.
    pub fn get(&self, name: &str) -> Result<Arc<Collection>, Error> {
        self.collections
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| Error::collection_not_found(name))
    }

    /// Remove a collection by name.
    pub fn remove(&self, name: &str) -> Result<(), Error> {
        self.collections
            .write()
            .expect("registry lock poisoned")
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::collection_not_found(name))
    }

    /// Registered collection names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.collections
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.collections
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections
            .read()
            .expect("registry lock poisoned")
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
