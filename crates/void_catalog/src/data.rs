//! Catalog data model
//!
//! The serialized form produced by the content build. Entries reference their
//! dependencies by key; [`ContentCatalogData::create_locator`] resolves them
//! into shared location graphs.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use void_resource::ResourceLocation;

use crate::error::{CatalogError, CatalogResult};
use crate::locator::ResourceLocationMap;

/// Provider listed by the catalog
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One addressable resource
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Keys the entry answers to. The first is its primary key.
    pub keys: Vec<String>,
    pub internal_id: String,
    pub provider_id: String,
    #[serde(default)]
    pub resource_type: String,
    /// Keys of other entries, in load order
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CatalogEntry {
    /// Entry with one key
    pub fn new(
        key: impl Into<String>,
        internal_id: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            keys: vec![key.into()],
            internal_id: internal_id.into(),
            provider_id: provider_id.into(),
            resource_type: String::new(),
            dependencies: Vec::new(),
            data: None,
        }
    }

    /// Add an alternative key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// Add a dependency key
    pub fn with_dependency(mut self, key: impl Into<String>) -> Self {
        self.dependencies.push(key.into());
        self
    }

    /// Attach provider data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// First key, or the internal id for key-less entries
    pub fn primary_key(&self) -> &str {
        self.keys.first().map_or(self.internal_id.as_str(), String::as_str)
    }
}

/// Serialized content catalog
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentCatalogData {
    pub locator_id: String,
    pub build_version: String,
    pub resource_providers: Vec<ProviderDescriptor>,
    pub entries: Vec<CatalogEntry>,
    /// Hash identifying this catalog version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_hash: Option<String>,
}

impl ContentCatalogData {
    /// Empty catalog
    pub fn new(locator_id: impl Into<String>) -> Self {
        Self {
            locator_id: locator_id.into(),
            ..Default::default()
        }
    }

    /// Builder-style entry
    pub fn with_entry(mut self, entry: CatalogEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Builder-style hash
    pub fn with_local_hash(mut self, hash: impl Into<String>) -> Self {
        self.local_hash = Some(hash.into());
        self
    }

    /// Parse from JSON text
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> CatalogResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize to JSON text
    pub fn to_json(&self) -> CatalogResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resolve entries into a locator named after this catalog
    pub fn create_locator(&self) -> CatalogResult<ResourceLocationMap> {
        self.create_locator_with_id(&self.locator_id)
    }

    /// Resolve entries into a locator with an explicit id
    pub fn create_locator_with_id(&self, id: &str) -> CatalogResult<ResourceLocationMap> {
        let mut by_key: HashMap<&str, usize> = HashMap::new();
        for (index, entry) in self.entries.iter().enumerate() {
            for key in &entry.keys {
                by_key.entry(key.as_str()).or_insert(index);
            }
        }

        let mut resolver = Resolver {
            entries: &self.entries,
            by_key,
            resolved: vec![None; self.entries.len()],
            visiting: vec![false; self.entries.len()],
        };

        let mut map = ResourceLocationMap::new(id);
        for (index, entry) in self.entries.iter().enumerate() {
            let location = resolver.resolve(index)?;
            for key in &entry.keys {
                map.add(key.clone(), location.clone());
            }
        }
        log::debug!("catalog `{id}` resolved {} entries", self.entries.len());
        Ok(map)
    }
}

/// Memoized depth-first dependency resolution
struct Resolver<'a> {
    entries: &'a [CatalogEntry],
    by_key: HashMap<&'a str, usize>,
    resolved: Vec<Option<Arc<ResourceLocation>>>,
    visiting: Vec<bool>,
}

impl Resolver<'_> {
    fn resolve(&mut self, index: usize) -> CatalogResult<Arc<ResourceLocation>> {
        if let Some(location) = &self.resolved[index] {
            return Ok(location.clone());
        }
        let entries = self.entries;
        let entry = &entries[index];
        if self.visiting[index] {
            return Err(CatalogError::DependencyCycle(entry.primary_key().to_string()));
        }
        self.visiting[index] = true;

        let mut dependencies = Vec::with_capacity(entry.dependencies.len());
        for key in &entry.dependencies {
            let Some(&dep) = self.by_key.get(key.as_str()) else {
                return Err(CatalogError::UnknownDependency {
                    entry: entry.primary_key().to_string(),
                    dependency: key.clone(),
                });
            };
            dependencies.push(self.resolve(dep)?);
        }

        let mut location = ResourceLocation::new(
            entry.primary_key(),
            entry.internal_id.as_str(),
            entry.provider_id.as_str(),
        )
        .with_type(entry.resource_type.as_str())
        .with_dependencies(dependencies);
        if let Some(data) = &entry.data {
            location = location.with_data(data.clone());
        }

        let location = location.shared();
        self.visiting[index] = false;
        self.resolved[index] = Some(location.clone());
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::ResourceLocator;

    fn sample() -> ContentCatalogData {
        ContentCatalogData::new("main")
            .with_entry(CatalogEntry::new("shared", "shared.bundle", "bundle"))
            .with_entry(
                CatalogEntry::new("hero", "hero.txt", "text")
                    .with_key("player")
                    .with_dependency("shared"),
            )
            .with_entry(CatalogEntry::new("villain", "villain.txt", "text").with_dependency("shared"))
            .with_local_hash("abc")
    }

    #[test]
    fn test_json_roundtrip_keeps_hash() {
        let data = sample();
        let parsed = ContentCatalogData::from_json(&data.to_json().unwrap()).unwrap();
        assert_eq!(parsed, data);
        assert_eq!(parsed.local_hash.as_deref(), Some("abc"));
    }

    #[test]
    fn test_minimal_json() {
        let data = ContentCatalogData::from_json(
            r#"{ "entries": [ { "keys": ["a"], "internal_id": "a.txt", "provider_id": "text" } ] }"#,
        )
        .unwrap();
        assert_eq!(data.entries.len(), 1);
        assert!(data.local_hash.is_none());
        assert!(ContentCatalogData::from_json("{").is_err());
    }

    #[test]
    fn test_locator_shares_dependencies() {
        let map = sample().create_locator().unwrap();

        let hero = &map.locate("hero").unwrap()[0];
        let player = &map.locate("player").unwrap()[0];
        let villain = &map.locate("villain").unwrap()[0];
        assert!(Arc::ptr_eq(hero, player));
        assert!(Arc::ptr_eq(&hero.dependencies()[0], &villain.dependencies()[0]));
        assert_eq!(hero.dependencies()[0].internal_id(), "shared.bundle");
    }

    #[test]
    fn test_unknown_dependency() {
        let data = ContentCatalogData::new("bad")
            .with_entry(CatalogEntry::new("a", "a.txt", "text").with_dependency("missing"));
        assert!(matches!(
            data.create_locator(),
            Err(CatalogError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_dependency_cycle() {
        let data = ContentCatalogData::new("loop")
            .with_entry(CatalogEntry::new("a", "a.txt", "text").with_dependency("b"))
            .with_entry(CatalogEntry::new("b", "b.txt", "text").with_dependency("a"));
        assert!(matches!(
            data.create_locator(),
            Err(CatalogError::DependencyCycle(_))
        ));
    }
}
