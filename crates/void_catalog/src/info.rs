//! Per-catalog bookkeeping

use std::rc::Rc;
use std::sync::Arc;

use void_resource::ResourceLocation;

use crate::locator::{ResourceLocationMap, ResourceLocator};
use crate::versioning::{check_hash_dependencies, CACHE_HASH_INDEX, REMOTE_HASH_INDEX};

/// A loaded catalog: its active locator, the hash it was loaded at and the
/// location used to (re)load it
#[derive(Clone, Debug)]
pub struct CatalogLocatorInfo {
    locator: Rc<ResourceLocationMap>,
    local_hash: Option<String>,
    catalog_location: Arc<ResourceLocation>,
    content_update_available: bool,
}

impl CatalogLocatorInfo {
    pub fn new(
        locator: ResourceLocationMap,
        local_hash: Option<String>,
        catalog_location: Arc<ResourceLocation>,
    ) -> Self {
        Self {
            locator: Rc::new(locator),
            local_hash,
            catalog_location,
            content_update_available: false,
        }
    }

    /// Catalog id
    pub fn id(&self) -> &str {
        self.locator.locator_id()
    }

    /// Active locator
    pub fn locator(&self) -> &Rc<ResourceLocationMap> {
        &self.locator
    }

    /// Hash of the active catalog
    pub fn local_hash(&self) -> Option<&str> {
        self.local_hash.as_deref()
    }

    /// Location of the catalog itself
    pub fn catalog_location(&self) -> &Arc<ResourceLocation> {
        &self.catalog_location
    }

    /// Set by update checks that found a newer remote hash
    pub fn content_update_available(&self) -> bool {
        self.content_update_available
    }

    /// Remote hash location, if the catalog is versioned
    pub fn hash_location(&self) -> Option<&Arc<ResourceLocation>> {
        check_hash_dependencies(&self.catalog_location).ok()?;
        self.catalog_location.dependencies().get(REMOTE_HASH_INDEX)
    }

    /// Cached hash location, if the catalog is versioned
    pub fn cache_hash_location(&self) -> Option<&Arc<ResourceLocation>> {
        check_hash_dependencies(&self.catalog_location).ok()?;
        self.catalog_location.dependencies().get(CACHE_HASH_INDEX)
    }

    pub(crate) fn set_content_update_available(&mut self, available: bool) {
        self.content_update_available = available;
    }

    /// Swap in a newer catalog
    pub(crate) fn replace(&mut self, locator: ResourceLocationMap, local_hash: Option<String>) {
        self.locator = Rc::new(locator);
        self.local_hash = local_hash;
        self.content_update_available = false;
    }
}
