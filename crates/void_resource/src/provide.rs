//! Provide dispatch - turning locations into operations
//!
//! A provide request is deduplicated by `(internal id, provider id, type)`.
//! Dependencies are provided first as an untyped group; the provider runs
//! once that group is terminal.

use std::sync::Arc;

use crate::error::ResourceError;
use crate::group::GroupOptions;
use crate::handle::{Handle, OperationStatus, ResourceType, UntypedHandle};
use crate::location::ResourceLocation;
use crate::manager::ResourceManager;
use crate::operation::{OperationKind, ProvideState};
use crate::provider::{ProvideRequest, ProviderBehaviourFlags};

impl ResourceManager {
    /// Load `location` as `T`
    pub fn provide<T: 'static>(&mut self, location: &Arc<ResourceLocation>) -> Handle<T> {
        self.provide_untyped(location, ResourceType::of::<T>()).typed()
    }

    /// Load `location` as `resource_type`.
    ///
    /// Returns the existing operation (with one more reference) if the same
    /// location and type is already loading or loaded. If no provider accepts
    /// the location the returned operation has already failed with
    /// [`ResourceError::UnknownProvider`].
    pub fn provide_untyped(
        &mut self,
        location: &Arc<ResourceLocation>,
        resource_type: ResourceType,
    ) -> UntypedHandle {
        self.provide_inner(location, resource_type, true)
    }

    /// Load `location` as `T` with a new operation, even if the same location
    /// is already loaded. Its dependencies are loaded anew too. The operation
    /// is never reused by later provide calls.
    pub fn provide_fresh<T: 'static>(&mut self, location: &Arc<ResourceLocation>) -> Handle<T> {
        self.provide_fresh_untyped(location, ResourceType::of::<T>()).typed()
    }

    /// Untyped [`provide_fresh`](Self::provide_fresh)
    pub fn provide_fresh_untyped(
        &mut self,
        location: &Arc<ResourceLocation>,
        resource_type: ResourceType,
    ) -> UntypedHandle {
        self.provide_inner(location, resource_type, false)
    }

    fn provide_inner(
        &mut self,
        location: &Arc<ResourceLocation>,
        resource_type: ResourceType,
        shared: bool,
    ) -> UntypedHandle {
        let cache_key = location.cache_key(resource_type.id);
        if let Some(&cached) = self.cache.get(&cache_key).filter(|_| shared) {
            match self.acquire_untyped(cached) {
                Ok(handle) => {
                    log::trace!("reusing {handle:?} for `{}`", location.primary_key());
                    return handle;
                }
                Err(err) => {
                    log::debug!("dropping stale cache entry for `{}`: {err}", location.primary_key());
                    self.cache.remove(&cache_key);
                }
            }
        }

        let Some(provider) = self.providers.select(resource_type, location) else {
            let error = ResourceError::UnknownProvider {
                location: location.primary_key().to_string(),
                provider_id: location.provider_id().to_string(),
                type_name: resource_type.name,
            };
            log::warn!("{error}");
            return self.create_completed_operation_raw(None, false, Some(error));
        };

        let dependencies = if location.has_dependencies() {
            Some(self.provide_dependencies(location, shared))
        } else {
            None
        };

        let handle = self.allocate(OperationKind::Provide(ProvideState {
            location: location.clone(),
            provider,
            resource_type,
            cache_key: cache_key.clone(),
            dependencies,
            executed: false,
        }));
        if shared {
            self.cache.insert(cache_key, handle);
        }
        log::debug!(
            "providing `{}` as {} ({handle:?})",
            location.primary_key(),
            resource_type.name
        );

        self.start_operation(handle, dependencies);
        handle
    }

    /// Load many locations as `T`, grouped into one operation
    pub fn provide_resources<T: 'static>(
        &mut self,
        locations: &[Arc<ResourceLocation>],
    ) -> Handle<Vec<UntypedHandle>> {
        let members = locations
            .iter()
            .map(|location| self.provide_untyped(location, ResourceType::of::<T>()))
            .collect();
        self.create_group_operation_owned(members, GroupOptions::default())
    }

    fn provide_dependencies(&mut self, location: &ResourceLocation, shared: bool) -> UntypedHandle {
        let members = location
            .dependencies()
            .iter()
            .map(|dep| self.provide_inner(dep, ResourceType::any(), shared))
            .collect();
        self.create_group(members, GroupOptions::default(), None)
    }

    /// Dependencies are terminal: gather their results and invoke the provider
    pub(crate) fn execute_provide(&mut self, handle: UntypedHandle) {
        let (location, provider, resource_type, dependencies) =
            match self.pool.get(handle).map(|slot| &slot.kind) {
                Some(OperationKind::Provide(state)) => (
                    state.location.clone(),
                    state.provider.clone(),
                    state.resource_type,
                    state.dependencies,
                ),
                _ => return,
            };

        let mut results = Vec::new();
        if let Some(group) = dependencies {
            let members = self.group_members(group);
            let expected = location.dependencies();
            let mut failed = Vec::new();

            for (index, member) in members.iter().enumerate() {
                let key = expected.get(index).map_or("<unknown>", |dep| dep.primary_key());
                match self.pool.live(*member) {
                    Some(slot) if slot.status == OperationStatus::Succeeded => {
                        results.push(slot.result.clone())
                    }
                    Some(slot) => {
                        results.push(None);
                        failed.push(match &slot.error {
                            Some(error) => format!("{key}: {error}"),
                            None => key.to_string(),
                        });
                    }
                    None => {
                        results.push(None);
                        failed.push(format!("{key}: released"));
                    }
                }
            }
            if members.len() != expected.len() {
                failed.push(format!(
                    "expected {} dependencies, got {}",
                    expected.len(),
                    members.len()
                ));
            }

            if !failed.is_empty() {
                let tolerant = provider
                    .behaviour_flags()
                    .contains(ProviderBehaviourFlags::CAN_PROVIDE_WITH_FAILED_DEPENDENCIES);
                if !tolerant {
                    let error = ResourceError::DependencyFailed {
                        location: location.primary_key().to_string(),
                        failed,
                    };
                    if let Err(err) = self.complete_raw(handle, None, false, Some(error)) {
                        log::warn!("could not fail {handle:?}: {err}");
                    }
                    return;
                }
                log::debug!(
                    "`{}` continues with {} failed dependencies",
                    location.primary_key(),
                    failed.len()
                );
            }
        }

        if let Some(slot) = self.pool.get_mut(handle) {
            if let OperationKind::Provide(state) = &mut slot.kind {
                state.executed = true;
            }
        }

        let request = ProvideRequest::new(
            handle,
            location,
            resource_type,
            provider.provider_id().to_string(),
            results,
        );
        provider.provide(self, request);
    }
}
