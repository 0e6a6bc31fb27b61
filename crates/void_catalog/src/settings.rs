//! Runtime settings - which catalogs to load at startup

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use void_resource::{ContentSource, ResourceLocation, ResourceManagerConfig};

use crate::error::CatalogResult;
use crate::provider::{CATALOG_HASH_PROVIDER_ID, CONTENT_CATALOG_PROVIDER_ID};

/// One catalog to load
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Catalog key, used as the catalog location's primary key
    pub key: String,
    /// Id of the build-embedded catalog data
    pub internal_id: String,
    /// Id of the remote hash file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_hash: Option<String>,
    /// Id of the cached hash file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hash: Option<String>,
}

impl CatalogSettings {
    /// Unversioned catalog
    pub fn new(key: impl Into<String>, internal_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            internal_id: internal_id.into(),
            remote_hash: None,
            cache_hash: None,
        }
    }

    /// Versioned catalog with remote and cached hash ids
    pub fn with_hashes(mut self, remote_hash: impl Into<String>, cache_hash: impl Into<String>) -> Self {
        self.remote_hash = Some(remote_hash.into());
        self.cache_hash = Some(cache_hash.into());
        self
    }

    /// Catalog location. Versioned catalogs depend on their remote and cached
    /// hash locations, in that order.
    pub fn to_location(&self) -> Arc<ResourceLocation> {
        let dependencies = match (&self.remote_hash, &self.cache_hash) {
            (Some(remote), Some(cache)) => vec![
                ResourceLocation::new(format!("{}#remote_hash", self.key), remote.as_str(), CATALOG_HASH_PROVIDER_ID)
                    .shared(),
                ResourceLocation::new(format!("{}#cache_hash", self.key), cache.as_str(), CATALOG_HASH_PROVIDER_ID)
                    .shared(),
            ],
            _ => Vec::new(),
        };
        ResourceLocation::new(self.key.as_str(), self.internal_id.as_str(), CONTENT_CATALOG_PROVIDER_ID)
            .with_type("ContentCatalogData")
            .with_dependencies(dependencies)
            .shared()
    }
}

/// Startup settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub catalogs: Vec<CatalogSettings>,
    /// Skip remote catalog checks while initializing
    pub disable_catalog_update_on_start: bool,
    pub manager: ResourceManagerConfig,
}

impl RuntimeSettings {
    /// Parse from JSON text
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse from a content source
    pub fn load(source: &dyn ContentSource, id: &str) -> CatalogResult<Self> {
        let bytes = source.read(id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_resource::MemorySource;

    #[test]
    fn test_settings_from_json() {
        let settings = RuntimeSettings::from_json(
            r#"{
                "catalogs": [
                    { "key": "main", "internal_id": "catalog.json",
                      "remote_hash": "remote/catalog.hash", "cache_hash": "cache/catalog.hash" },
                    { "key": "dlc", "internal_id": "dlc.json" }
                ],
                "disable_catalog_update_on_start": true,
                "manager": { "wait_timeout_ms": 500 }
            }"#,
        )
        .unwrap();

        assert!(settings.disable_catalog_update_on_start);
        assert_eq!(settings.manager.wait_timeout_ms, 500);
        assert_eq!(settings.catalogs[0].to_location().dependencies().len(), 2);
        assert!(settings.catalogs[1].to_location().dependencies().is_empty());

        let location = settings.catalogs[0].to_location();
        assert_eq!(location.dependencies()[0].internal_id(), "remote/catalog.hash");
        assert_eq!(location.dependencies()[1].provider_id(), CATALOG_HASH_PROVIDER_ID);
    }

    #[test]
    fn test_settings_from_source() {
        let source = MemorySource::new().with_entry("settings.json", r#"{ "catalogs": [] }"#);
        let settings = RuntimeSettings::load(&source, "settings.json").unwrap();
        assert_eq!(settings, RuntimeSettings::default());
        assert!(RuntimeSettings::load(&source, "missing.json").is_err());
    }
}
