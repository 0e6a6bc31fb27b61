//! Resource locators - key to location lookup

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use void_resource::ResourceLocation;

/// Maps keys to resource locations
pub trait ResourceLocator {
    /// Id of the locator, usually the catalog id
    fn locator_id(&self) -> &str;

    /// All keys, sorted
    fn keys(&self) -> Vec<String>;

    /// Locations registered for `key`, in registration order
    fn locate(&self, key: &str) -> Option<&[Arc<ResourceLocation>]>;
}

/// Hash map backed locator
#[derive(Clone, Debug, Default)]
pub struct ResourceLocationMap {
    id: String,
    locations: HashMap<String, Vec<Arc<ResourceLocation>>>,
}

impl ResourceLocationMap {
    /// Create an empty map
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locations: HashMap::new(),
        }
    }

    /// Register a location under `key`
    pub fn add(&mut self, key: impl Into<String>, location: Arc<ResourceLocation>) {
        self.locations.entry(key.into()).or_default().push(location);
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Internal ids of every location, including dependencies
    pub fn internal_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        let mut stack: Vec<&Arc<ResourceLocation>> = self.locations.values().flatten().collect();
        while let Some(location) = stack.pop() {
            if ids.insert(location.internal_id().to_string()) {
                stack.extend(location.dependencies());
            }
        }
        ids
    }
}

impl ResourceLocator for ResourceLocationMap {
    fn locator_id(&self) -> &str {
        &self.id
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.locations.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn locate(&self, key: &str) -> Option<&[Arc<ResourceLocation>]> {
        self.locations.get(key).map(Vec::as_slice)
    }
}
