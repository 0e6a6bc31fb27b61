//! Content catalog provider
//!
//! Provides [`ContentCatalogData`] for a catalog location. The two hash
//! dependencies are fetched first (by a text provider that ignores failures),
//! then [`select_catalog`] picks the catalog to read.

use std::cell::Cell;
use std::sync::Arc;

use void_resource::{
    ContentSource, ProvideRequest, ProviderBehaviourFlags, ResourceLocation, ResourceManager,
    ResourceProvider, ResourceType,
};

use crate::data::ContentCatalogData;
use crate::error::{CatalogError, CatalogResult};
use crate::versioning::{
    cache_data_id, check_hash_dependencies, select_catalog, CatalogSelection, CatalogSource,
    CACHE_HASH_INDEX, HASH_DEPENDENCY_COUNT,
};

/// Default id of [`ContentCatalogProvider`]
pub const CONTENT_CATALOG_PROVIDER_ID: &str = "ContentCatalogProvider";

/// Provider id used for catalog hash locations
pub const CATALOG_HASH_PROVIDER_ID: &str = "CatalogHashProvider";

/// Loads catalogs, choosing between local, cached and remote copies
pub struct ContentCatalogProvider {
    id: String,
    source: Arc<dyn ContentSource>,
    force_local: Cell<bool>,
}

impl ContentCatalogProvider {
    /// Provider with the default id
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            id: CONTENT_CATALOG_PROVIDER_ID.to_string(),
            source,
            force_local: Cell::new(false),
        }
    }

    /// Builder-style force-local flag
    pub fn with_force_local(self, force_local: bool) -> Self {
        self.force_local.set(force_local);
        self
    }

    /// Skip remote catalogs
    pub fn set_force_local(&self, force_local: bool) {
        self.force_local.set(force_local);
    }

    /// Check if remote catalogs are skipped
    pub fn force_local(&self) -> bool {
        self.force_local.get()
    }

    /// Candidates in fallback order: the selection, then cache, then local
    fn candidates(
        &self,
        location: &ResourceLocation,
        selection: CatalogSelection,
        cached_hash: Option<String>,
    ) -> Vec<CatalogSelection> {
        let mut candidates = vec![selection];
        if candidates[0].source == CatalogSource::Remote {
            if let Some(id) = cache_data_id(location) {
                candidates.push(CatalogSelection {
                    source: CatalogSource::Cache,
                    id_to_load: id,
                    local_hash: cached_hash,
                });
            }
        }
        if candidates[0].source != CatalogSource::Local {
            candidates.push(CatalogSelection::local(location));
        }
        candidates
    }

    fn load(
        &self,
        location: &ResourceLocation,
        candidates: Vec<CatalogSelection>,
    ) -> CatalogResult<ContentCatalogData> {
        let mut last_error = None;
        for candidate in candidates {
            let loaded = self
                .source
                .read(&candidate.id_to_load)
                .map_err(CatalogError::from)
                .and_then(|bytes| ContentCatalogData::from_slice(&bytes).map(|data| (bytes, data)));

            match loaded {
                Ok((bytes, mut data)) => {
                    if candidate.source == CatalogSource::Remote {
                        self.persist(location, &bytes, candidate.local_hash.as_deref());
                    }
                    if candidate.local_hash.is_some() {
                        data.local_hash = candidate.local_hash;
                    }
                    return Ok(data);
                }
                Err(err) => {
                    log::warn!(
                        "catalog `{}` could not be loaded from {:?} `{}`: {err}",
                        location.primary_key(),
                        candidate.source,
                        candidate.id_to_load
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CatalogError::UnknownCatalog(location.primary_key().to_string())))
    }

    /// Store a downloaded catalog and its hash as the new cached copy
    fn persist(&self, location: &ResourceLocation, bytes: &[u8], hash: Option<&str>) {
        if check_hash_dependencies(location).is_err() {
            return;
        }
        let hash_id = location.dependencies()[CACHE_HASH_INDEX].internal_id();
        let Some(data_id) = cache_data_id(location) else {
            return;
        };

        if let Err(err) = self.source.write(&data_id, bytes) {
            log::warn!("failed to cache catalog `{data_id}`: {err}");
            return;
        }
        if let Some(hash) = hash {
            if let Err(err) = self.source.write(hash_id, hash.as_bytes()) {
                log::warn!("failed to cache catalog hash `{hash_id}`: {err}");
            }
        }
        log::debug!("cached catalog `{}` as `{data_id}`", location.primary_key());
    }
}

impl ResourceProvider for ContentCatalogProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn can_provide(&self, resource_type: ResourceType, location: &ResourceLocation) -> bool {
        location.provider_id() == self.id && resource_type.accepts::<ContentCatalogData>()
    }

    fn provide(&self, rm: &mut ResourceManager, request: ProvideRequest) {
        let location = request.location().clone();
        let hashes: Vec<Option<String>> = (0..location.dependencies().len())
            .map(|index| request.dependency::<String>(index).cloned())
            .collect();

        let selection = select_catalog(&location, &hashes, self.force_local.get());
        let cached_hash = if hashes.len() == HASH_DEPENDENCY_COUNT {
            hashes[CACHE_HASH_INDEX]
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        let candidates = self.candidates(&location, selection, cached_hash);
        let completed = match self.load(&location, candidates) {
            Ok(data) => request.complete(rm, data),
            Err(err) => request.fail(rm, err.to_string()),
        };
        if let Err(err) = completed {
            log::warn!("catalog provider could not complete `{}`: {err}", location.primary_key());
        }
    }

    fn behaviour_flags(&self) -> ProviderBehaviourFlags {
        ProviderBehaviourFlags::CAN_PROVIDE_WITH_FAILED_DEPENDENCIES
    }
}
