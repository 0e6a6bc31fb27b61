//! Content catalogs - loaded catalogs, lookup and content updates
//!
//! [`ContentCatalogs`] is a cheap clonable handle to shared state so that
//! chain continuations can update it when their work completes.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use void_resource::providers::{JsonDataProvider, TextDataProvider};
use void_resource::{
    ChainOptions, ContentSource, GroupOptions, Handle, OperationStatus, ResourceError,
    ResourceLocation, ResourceManager, UntypedHandle,
};

use crate::data::ContentCatalogData;
use crate::error::{CatalogError, CatalogResult};
use crate::info::CatalogLocatorInfo;
use crate::locator::ResourceLocator;
use crate::provider::{ContentCatalogProvider, CATALOG_HASH_PROVIDER_ID, CONTENT_CATALOG_PROVIDER_ID};
use crate::settings::RuntimeSettings;

/// Options for [`ContentCatalogs::apply_updates`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Evict cached archives no loaded catalog references once updated
    pub auto_cleanup_cache: bool,
}

/// Local store of downloaded archives
pub trait ArchiveCache {
    /// Ids of the archives currently cached
    fn cached_archives(&self) -> Vec<String>;

    /// Remove a cached archive
    fn evict(&self, archive_id: &str) -> bool;
}

#[derive(Default)]
struct CatalogState {
    infos: Vec<CatalogLocatorInfo>,
    /// Catalog provider registered by [`ContentCatalogs::register_providers`]
    catalog_provider: Option<Rc<ContentCatalogProvider>>,
}

/// The set of loaded catalogs
#[derive(Clone, Default)]
pub struct ContentCatalogs {
    state: Rc<RefCell<CatalogState>>,
    archive_cache: Option<Rc<dyn ArchiveCache>>,
}

impl ContentCatalogs {
    /// No catalogs, no archive cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the archive cache cleaned by [`cleanup_cache`](Self::cleanup_cache)
    pub fn with_archive_cache(mut self, cache: Rc<dyn ArchiveCache>) -> Self {
        self.archive_cache = Some(cache);
        self
    }

    /// Register the providers catalogs rely on, unless already present.
    /// `force_local` applies to catalog loads until [`initialize`](Self::initialize)
    /// completes.
    pub fn register_providers(&self, rm: &mut ResourceManager, source: Arc<dyn ContentSource>, force_local: bool) {
        if rm.providers().get(CATALOG_HASH_PROVIDER_ID).is_none() {
            rm.add_provider(TextDataProvider::with_id(CATALOG_HASH_PROVIDER_ID, source.clone()).ignore_failures(true));
        }
        if rm.providers().get(void_resource::providers::TEXT_DATA_PROVIDER_ID).is_none() {
            rm.add_provider(TextDataProvider::new(source.clone()));
        }
        if rm.providers().get(void_resource::providers::JSON_DATA_PROVIDER_ID).is_none() {
            rm.add_provider(JsonDataProvider::new(source.clone()));
        }
        if rm.providers().get(CONTENT_CATALOG_PROVIDER_ID).is_none() {
            let provider = Rc::new(ContentCatalogProvider::new(source));
            rm.register_provider(provider.clone());
            self.state.borrow_mut().catalog_provider = Some(provider);
        }
        self.set_force_local(force_local);
    }

    fn set_force_local(&self, force_local: bool) {
        if let Some(provider) = &self.state.borrow().catalog_provider {
            provider.set_force_local(force_local);
        }
    }

    /// Register a loaded catalog, replacing one with the same id.
    /// Returns the catalog id.
    pub fn add_catalog(
        &self,
        data: &ContentCatalogData,
        catalog_location: Arc<ResourceLocation>,
    ) -> CatalogResult<String> {
        let id = if data.locator_id.is_empty() {
            catalog_location.primary_key().to_string()
        } else {
            data.locator_id.clone()
        };
        let locator = data.create_locator_with_id(&id)?;
        let info = CatalogLocatorInfo::new(locator, data.local_hash.clone(), catalog_location);

        let mut state = self.state.borrow_mut();
        match state.infos.iter_mut().find(|existing| existing.id() == id) {
            Some(existing) => *existing = info,
            None => state.infos.push(info),
        }
        log::info!("catalog `{id}` registered");
        Ok(id)
    }

    /// Remove a catalog
    pub fn remove_catalog(&self, id: &str) -> CatalogResult<()> {
        let mut state = self.state.borrow_mut();
        let before = state.infos.len();
        state.infos.retain(|info| info.id() != id);
        if state.infos.len() == before {
            return Err(CatalogError::UnknownCatalog(id.to_string()));
        }
        Ok(())
    }

    /// Ids of the loaded catalogs, in registration order
    pub fn catalog_ids(&self) -> Vec<String> {
        self.state.borrow().infos.iter().map(|info| info.id().to_string()).collect()
    }

    /// Snapshot of one catalog
    pub fn info(&self, id: &str) -> Option<CatalogLocatorInfo> {
        self.state.borrow().infos.iter().find(|info| info.id() == id).cloned()
    }

    /// Snapshot of every catalog
    pub fn infos(&self) -> Vec<CatalogLocatorInfo> {
        self.state.borrow().infos.clone()
    }

    /// Locations for `key` from the first catalog that knows it
    pub fn locate_all(&self, key: &str) -> Vec<Arc<ResourceLocation>> {
        self.state
            .borrow()
            .infos
            .iter()
            .find_map(|info| info.locator().locate(key).map(<[_]>::to_vec))
            .unwrap_or_default()
    }

    /// First location for `key`
    pub fn locate(&self, key: &str) -> Option<Arc<ResourceLocation>> {
        self.locate_all(key).into_iter().next()
    }

    /// Provide the resource registered under `key`
    pub fn load_resource<T: 'static>(&self, rm: &mut ResourceManager, key: &str) -> Handle<T> {
        match self.locate(key) {
            Some(location) => rm.provide::<T>(&location),
            None => {
                log::warn!("no location for key `{key}`");
                rm.create_failed_operation(ResourceError::InvalidKey(key.to_string()))
            }
        }
    }

    /// Versioned catalogs: `(id, catalog location)`
    fn versioned(&self, ids: Option<&[String]>) -> Vec<(String, Arc<ResourceLocation>)> {
        let state = self.state.borrow();
        if let Some(ids) = ids {
            for id in ids {
                if !state.infos.iter().any(|info| info.id() == id) {
                    log::warn!("ignoring unknown catalog `{id}`");
                }
            }
        }
        state
            .infos
            .iter()
            .filter(|info| info.hash_location().is_some())
            .filter(|info| ids.map_or(true, |ids| ids.iter().any(|id| id == info.id())))
            .map(|info| (info.id().to_string(), info.catalog_location().clone()))
            .collect()
    }

    /// Fetch every versioned catalog's remote hash and report the ids whose
    /// hash differs from the loaded one. Loaded locators are not modified.
    pub fn check_for_updates(&self, rm: &mut ResourceManager) -> Handle<Vec<String>> {
        let targets: Vec<(String, Arc<ResourceLocation>)> = self
            .state
            .borrow()
            .infos
            .iter()
            .filter_map(|info| {
                info.hash_location()
                    .map(|hash| (info.id().to_string(), hash.clone()))
            })
            .collect();
        if targets.is_empty() {
            return rm.create_completed_operation(Vec::new());
        }

        let members: Vec<UntypedHandle> = targets
            .iter()
            .map(|(_, hash)| rm.provide_fresh::<String>(hash).untyped())
            .collect();
        let group = rm.create_group_operation_owned(members, GroupOptions::default());

        let catalogs = self.clone();
        let check = rm.create_chain_operation_with(group, ChainOptions::tolerant(), move |rm, group| {
            let members = rm.group_members(group);
            let mut changed = Vec::new();
            let mut state = catalogs.state.borrow_mut();
            for ((id, _), member) in targets.iter().zip(members) {
                let Some(remote) = fetched_hash(rm, member) else {
                    log::debug!("no remote hash for catalog `{id}`");
                    continue;
                };
                if let Some(info) = state.infos.iter_mut().find(|info| info.id() == id) {
                    if info.local_hash() != Some(remote.as_str()) {
                        info.set_content_update_available(true);
                        changed.push(id.clone());
                    }
                }
            }
            log::info!("{} catalog(s) have updates", changed.len());
            rm.create_completed_operation(changed)
        });
        finish_with_group(rm, group, check)
    }

    /// Reload versioned catalogs and swap in the ones whose hash changed.
    ///
    /// `catalog_ids` limits the update; `None` updates every versioned
    /// catalog. The result lists the catalogs that were replaced. If any
    /// catalog failed to reload the operation fails, still carrying that list.
    pub fn apply_updates(
        &self,
        rm: &mut ResourceManager,
        catalog_ids: Option<Vec<String>>,
        options: UpdateOptions,
    ) -> Handle<Vec<String>> {
        let targets = self.versioned(catalog_ids.as_deref());
        if targets.is_empty() {
            return rm.create_completed_operation(Vec::new());
        }

        let members: Vec<UntypedHandle> = targets
            .iter()
            .map(|(_, location)| rm.provide_fresh::<ContentCatalogData>(location).untyped())
            .collect();
        let group = rm.create_group_operation_owned(members, GroupOptions::default());

        let catalogs = self.clone();
        let apply = rm.create_chain_operation_with(group, ChainOptions::tolerant(), move |rm, group| {
            let members = rm.group_members(group);
            let mut updated = Vec::new();
            let mut failed = Vec::new();

            for ((id, _), member) in targets.iter().zip(members) {
                match catalogs.apply_one(rm, id, member) {
                    Ok(true) => updated.push(id.clone()),
                    Ok(false) => {}
                    Err(reason) => failed.push(format!("{id}: {reason}")),
                }
            }
            if options.auto_cleanup_cache {
                catalogs.cleanup_cache();
            }

            if failed.is_empty() {
                rm.create_completed_operation(updated)
            } else {
                let error = ResourceError::DependencyFailed {
                    location: "catalog update".to_string(),
                    failed,
                };
                rm.create_completed_operation_raw(Some(Rc::new(updated)), false, Some(error))
                    .typed()
            }
        });
        finish_with_group(rm, group, apply)
    }

    /// Swap in one reloaded catalog. `Ok(true)` if it changed.
    fn apply_one(&self, rm: &ResourceManager, id: &str, member: UntypedHandle) -> Result<bool, String> {
        let loaded = matches!(rm.status(member), Ok(OperationStatus::Succeeded));
        let data = match rm.result(member.typed::<ContentCatalogData>()) {
            Ok(Some(data)) if loaded => data,
            Ok(_) => return Err(failure_reason(rm, member)),
            Err(err) => return Err(err.to_string()),
        };

        let mut state = self.state.borrow_mut();
        let Some(info) = state.infos.iter_mut().find(|info| info.id() == id) else {
            return Err(CatalogError::UnknownCatalog(id.to_string()).to_string());
        };
        if info.local_hash() == data.local_hash.as_deref() {
            info.set_content_update_available(false);
            return Ok(false);
        }
        let locator = data.create_locator_with_id(id).map_err(|e| e.to_string())?;
        log::info!(
            "catalog `{id}` updated {:?} -> {:?}",
            info.local_hash(),
            data.local_hash
        );
        info.replace(locator, data.local_hash.clone());
        Ok(true)
    }

    /// Evict cached archives that no loaded catalog references.
    /// Returns the evicted ids.
    pub fn cleanup_cache(&self) -> Vec<String> {
        let Some(cache) = &self.archive_cache else {
            return Vec::new();
        };
        let referenced: BTreeSet<String> = self
            .state
            .borrow()
            .infos
            .iter()
            .flat_map(|info| info.locator().internal_ids())
            .collect();

        let evicted: Vec<String> = cache
            .cached_archives()
            .into_iter()
            .filter(|archive| !referenced.contains(archive))
            .filter(|archive| cache.evict(archive))
            .collect();
        if !evicted.is_empty() {
            log::info!("evicted {} unreferenced archive(s)", evicted.len());
        }
        evicted
    }

    /// Register the catalog providers and load every catalog in `settings`.
    ///
    /// The result lists the ids of the catalogs that loaded; it fails if any
    /// catalog could not be loaded. `disable_catalog_update_on_start` only
    /// affects these loads, later updates always consult the remote catalog.
    pub fn initialize(
        &self,
        rm: &mut ResourceManager,
        settings: &RuntimeSettings,
        source: Arc<dyn ContentSource>,
    ) -> Handle<Vec<String>> {
        self.register_providers(rm, source, settings.disable_catalog_update_on_start);

        let locations: Vec<Arc<ResourceLocation>> =
            settings.catalogs.iter().map(|catalog| catalog.to_location()).collect();
        if locations.is_empty() {
            return rm.create_completed_operation(Vec::new());
        }
        log::info!("loading {} catalog(s)", locations.len());

        let members: Vec<UntypedHandle> = locations
            .iter()
            .map(|location| rm.provide::<ContentCatalogData>(location).untyped())
            .collect();
        let group = rm.create_group_operation_owned(members, GroupOptions::default());

        let catalogs = self.clone();
        let load = rm.create_chain_operation_with(group, ChainOptions::tolerant(), move |rm, group| {
            catalogs.set_force_local(false);
            let members = rm.group_members(group);
            let mut loaded = Vec::new();
            let mut failed = Vec::new();

            for (location, member) in locations.iter().zip(members) {
                let key = location.primary_key();
                match rm.result(member.typed::<ContentCatalogData>()) {
                    Ok(Some(data)) => match catalogs.add_catalog(&data, location.clone()) {
                        Ok(id) => loaded.push(id),
                        Err(err) => failed.push(format!("{key}: {err}")),
                    },
                    _ => failed.push(format!("{key}: {}", failure_reason(rm, member))),
                }
            }

            if failed.is_empty() {
                rm.create_completed_operation(loaded)
            } else {
                let error = ResourceError::DependencyFailed {
                    location: "catalog initialization".to_string(),
                    failed,
                };
                rm.create_completed_operation_raw(Some(Rc::new(loaded)), false, Some(error))
                    .typed()
            }
        });
        finish_with_group(rm, group, load)
    }
}

/// Trimmed, non-empty hash fetched by `member`
fn fetched_hash(rm: &ResourceManager, member: UntypedHandle) -> Option<String> {
    let hash = rm.result(member.typed::<String>()).ok().flatten()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn failure_reason(rm: &ResourceManager, member: UntypedHandle) -> String {
    match rm.error(member) {
        Ok(Some(error)) => error.to_string(),
        _ => "catalog did not load".to_string(),
    }
}

/// Drop the caller's reference to `group`; the chain keeps its own
fn finish_with_group(
    rm: &mut ResourceManager,
    group: Handle<Vec<UntypedHandle>>,
    chain: Result<Handle<Vec<String>>, ResourceError>,
) -> Handle<Vec<String>> {
    let handle = match chain {
        Ok(handle) => handle,
        Err(err) => rm.create_failed_operation(err),
    };
    if let Err(err) = rm.release(group) {
        log::warn!("failed to release catalog group: {err}");
    }
    handle
}
