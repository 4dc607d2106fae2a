//! Collection registry.

use dashmap::DashMap;
use docrag_core::{AppError, AppResult};
use std::sync::Arc;

use super::collection::{Collection, CollectionOptions};

/// Registry of named collections.
///
/// Create one per process (or per test) and pass it to whoever needs a
/// collection. At most one `Collection` exists per name at any time.
#[derive(Debug, Default)]
pub struct Store {
    options: CollectionOptions,
    collections: DashMap<String, Arc<Collection>>,
}

impl Store {
    /// Create a store whose new collections use `options`.
    pub fn new(options: CollectionOptions) -> Self {
        Self {
            options,
            collections: DashMap::new(),
        }
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    /// Return the collection named `name`, creating it on first reference.
    pub fn get_or_create_collection(&self, name: &str) -> AppResult<Arc<Collection>> {
        if name.is_empty() {
            return Err(AppError::Config(
                "Collection name must not be empty".to_string(),
            ));
        }

        let collection = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(collection = name, metric = %self.options.metric, "creating collection");
                Arc::new(Collection::new(name, self.options))
            })
            .clone();

        Ok(collection)
    }

    /// Look up an existing collection.
    pub fn collection(&self, name: &str) -> AppResult<Arc<Collection>> {
        self.collections
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::CollectionNotFound(name.to_string()))
    }

    pub fn collection_exists(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Remove a collection and discard its state. No-op for unknown names.
    pub fn delete_collection(&self, name: &str) {
        if let Some((_, collection)) = self.collections.remove(name) {
            collection.ensure_deleted();
            tracing::debug!(collection = name, "deleted collection");
        }
    }

    /// Snapshot of collection names, in no particular order.
    pub fn list_collection_names(&self) -> Vec<String> {
        self.collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}
