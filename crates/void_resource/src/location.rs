//! Resource locations - where and how a resource is loaded

use core::any::TypeId;
use core::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Addressable description of a resource and its dependencies
///
/// Immutable once built. Catalogs own locations and hand out `Arc`s so that
/// many operations can reference the same location.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLocation {
    primary_key: String,
    internal_id: String,
    provider_id: String,
    resource_type: String,
    dependencies: Vec<Arc<ResourceLocation>>,
    data: Option<Value>,
}

impl ResourceLocation {
    /// Create a location with no dependencies
    pub fn new(
        primary_key: impl Into<String>,
        internal_id: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            primary_key: primary_key.into(),
            internal_id: internal_id.into(),
            provider_id: provider_id.into(),
            resource_type: String::new(),
            dependencies: Vec::new(),
            data: None,
        }
    }

    /// Set the declared resource type name
    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// Set the ordered dependency list
    pub fn with_dependencies(mut self, dependencies: Vec<Arc<ResourceLocation>>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Attach provider-specific data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Wrap in an `Arc` for sharing
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Address of the resource
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Fetch identifier: a path, URL or other provider-specific id
    pub fn internal_id(&self) -> &str {
        &self.internal_id
    }

    /// Id of the provider expected to load this location
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Declared type name
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Ordered dependency locations
    pub fn dependencies(&self) -> &[Arc<ResourceLocation>] {
        &self.dependencies
    }

    /// True if the location declares dependencies
    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Provider-specific data
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Expected size in bytes from provider data (`"size"`), if declared
    pub fn expected_size(&self) -> Option<u64> {
        self.data.as_ref()?.get("size")?.as_u64()
    }

    pub(crate) fn cache_key(&self, type_id: TypeId) -> LocationCacheKey {
        LocationCacheKey {
            internal_id: self.internal_id.clone(),
            provider_id: self.provider_id.clone(),
            type_id,
        }
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.primary_key)
    }
}

/// Key used to deduplicate in-flight and loaded operations
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LocationCacheKey {
    internal_id: String,
    provider_id: String,
    type_id: TypeId,
}
