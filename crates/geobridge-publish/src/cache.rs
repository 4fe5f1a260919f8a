//! # Existence Cache
//!
//! Remembers the remote layer listing of each workspace so repeated
//! "does layer X exist?" questions cost one request.
//!
//! ## Cache Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Category     Cached?   Invalidated by                                  │
//! │  ──────────   ───────   ──────────────────────────────────────────────  │
//! │  Layer        yes       workspace delete, layer delete, publish_layer   │
//! │  Workspace    no        (always queried)                                │
//! │  Style        no        (always queried)                                │
//! │  DataStore    no        (always queried)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any mutation that can change a workspace's layer set drops that
//! workspace's whole entry.

use std::collections::{HashMap, HashSet};

use geobridge_core::resources::ResourceCategory;

/// Per-session cache of remote names.
#[derive(Debug, Default)]
pub struct ExistenceCache {
    layers: HashMap<String, HashSet<String>>,
}

impl ExistenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether listings of `category` are kept between queries.
    pub fn is_cached(category: ResourceCategory) -> bool {
        matches!(category, ResourceCategory::Layer)
    }

    /// Cached answer, or `None` when the listing must be fetched.
    pub fn lookup(&self, workspace: &str, category: ResourceCategory, name: &str) -> Option<bool> {
        if !Self::is_cached(category) {
            return None;
        }
        self.layers
            .get(workspace)
            .map(|names| names.contains(name))
    }

    /// Stores a fetched listing. Uncached categories are ignored.
    pub fn store(
        &mut self,
        workspace: &str,
        category: ResourceCategory,
        names: impl IntoIterator<Item = String>,
    ) {
        if Self::is_cached(category) {
            self.layers
                .insert(workspace.to_string(), names.into_iter().collect());
        }
    }

    /// Forgets the layer listing of one workspace.
    pub fn invalidate_layers(&mut self, workspace: &str) {
        self.layers.remove(workspace);
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_layers_are_cached() {
        let mut cache = ExistenceCache::new();
        cache.store("ws", ResourceCategory::Style, vec!["s".to_string()]);
        assert_eq!(cache.lookup("ws", ResourceCategory::Style, "s"), None);

        cache.store("ws", ResourceCategory::Layer, vec!["a".to_string()]);
        assert_eq!(cache.lookup("ws", ResourceCategory::Layer, "a"), Some(true));
        assert_eq!(cache.lookup("ws", ResourceCategory::Layer, "b"), Some(false));
        assert_eq!(cache.lookup("other", ResourceCategory::Layer, "a"), None);
    }

    #[test]
    fn test_invalidation() {
        let mut cache = ExistenceCache::new();
        cache.store("ws", ResourceCategory::Layer, vec!["a".to_string()]);
        cache.store("ws2", ResourceCategory::Layer, vec!["a".to_string()]);

        cache.invalidate_layers("ws");
        assert_eq!(cache.lookup("ws", ResourceCategory::Layer, "a"), None);
        assert_eq!(cache.lookup("ws2", ResourceCategory::Layer, "a"), Some(true));

        cache.clear();
        assert_eq!(cache.lookup("ws2", ResourceCategory::Layer, "a"), None);
    }

    #[test]
    fn test_empty_listing_is_cached_as_absent() {
        let mut cache = ExistenceCache::new();
        cache.store("ws", ResourceCategory::Layer, Vec::new());
        assert_eq!(cache.lookup("ws", ResourceCategory::Layer, "a"), Some(false));
    }
}
