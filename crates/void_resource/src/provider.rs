//! Resource Providers - Pluggable loaders for resource locations
//!
//! Providers turn a [`ResourceLocation`] into a result value. They are
//! registered in order on the [`ResourceManager`]; the first provider whose
//! [`ResourceProvider::can_provide`] accepts a location serves it.

use core::ops::{BitOr, BitOrAssign};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{ResourceError, ResourceResult};
use crate::handle::{ResourceType, ResourceValue, UntypedHandle};
use crate::location::ResourceLocation;
use crate::manager::ResourceManager;

/// Optional provider behaviours
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProviderBehaviourFlags(u8);

impl ProviderBehaviourFlags {
    /// No special behaviour
    pub const NONE: Self = Self(0);
    /// The provider runs even if some dependencies failed, receiving only the
    /// results of the dependencies that succeeded
    pub const CAN_PROVIDE_WITH_FAILED_DEPENDENCIES: Self = Self(1);

    /// Check if all bits of `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ProviderBehaviourFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ProviderBehaviourFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A request handed to a provider
///
/// The provider must eventually complete the request, either synchronously
/// inside [`ResourceProvider::provide`] or later (for example from an
/// [`UpdateReceiver`](crate::manager::UpdateReceiver)).
#[derive(Clone)]
pub struct ProvideRequest {
    handle: UntypedHandle,
    location: Arc<ResourceLocation>,
    resource_type: ResourceType,
    provider_id: String,
    dependencies: Vec<Option<ResourceValue>>,
}

impl ProvideRequest {
    pub(crate) fn new(
        handle: UntypedHandle,
        location: Arc<ResourceLocation>,
        resource_type: ResourceType,
        provider_id: String,
        dependencies: Vec<Option<ResourceValue>>,
    ) -> Self {
        Self {
            handle,
            location,
            resource_type,
            provider_id,
            dependencies,
        }
    }

    /// Handle of the operation being served
    pub fn handle(&self) -> UntypedHandle {
        self.handle
    }

    /// Location being loaded
    pub fn location(&self) -> &Arc<ResourceLocation> {
        &self.location
    }

    /// Requested result type
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Dependency results in location order. Failed dependencies, which only
    /// reach tolerant providers, appear as `None`.
    pub fn dependencies(&self) -> &[Option<ResourceValue>] {
        &self.dependencies
    }

    /// Typed dependency result
    pub fn dependency<T: 'static>(&self, index: usize) -> Option<&T> {
        let value = self.dependencies.get(index)?.as_ref()?;
        (**value).downcast_ref::<T>()
    }

    /// Complete successfully with a value
    pub fn complete<T: 'static>(&self, rm: &mut ResourceManager, value: T) -> ResourceResult<()> {
        rm.complete_raw(self.handle, Some(Rc::new(value)), true, None)
    }

    /// Complete successfully without a value
    pub fn complete_empty(&self, rm: &mut ResourceManager) -> ResourceResult<()> {
        rm.complete_raw(self.handle, None, true, None)
    }

    /// Complete with a failure message
    pub fn fail(&self, rm: &mut ResourceManager, message: impl Into<String>) -> ResourceResult<()> {
        let error = ResourceError::ProviderFailed {
            provider_id: self.provider_id.clone(),
            location: self.location.internal_id().to_string(),
            message: message.into(),
        };
        rm.complete_raw(self.handle, None, false, Some(error))
    }

    /// Report fractional progress
    pub fn set_progress(&self, rm: &mut ResourceManager, progress: f32) {
        rm.set_progress(self.handle, progress);
    }

    /// Report byte progress
    pub fn set_download_status(&self, rm: &mut ResourceManager, downloaded: u64, total: u64) {
        rm.set_download_status(self.handle, downloaded, total);
    }
}

/// Trait implemented by resource providers
pub trait ResourceProvider {
    /// Id matched against [`ResourceLocation::provider_id`]
    fn provider_id(&self) -> &str;

    /// Check if this provider can load `location` as `resource_type`
    fn can_provide(&self, resource_type: ResourceType, location: &ResourceLocation) -> bool {
        let _ = resource_type;
        location.provider_id() == self.provider_id()
    }

    /// Start loading. Must eventually complete `request`.
    fn provide(&self, rm: &mut ResourceManager, request: ProvideRequest);

    /// Release a result produced by this provider. Called exactly once per
    /// executed operation, when its last handle is released.
    fn release(&self, location: &ResourceLocation, result: Option<&ResourceValue>) -> bool {
        let _ = (location, result);
        true
    }

    /// Behaviour flags
    fn behaviour_flags(&self) -> ProviderBehaviourFlags {
        ProviderBehaviourFlags::NONE
    }
}

/// Ordered list of providers
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Rc<dyn ResourceProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider. Earlier providers take precedence.
    pub fn register(&mut self, provider: Rc<dyn ResourceProvider>) {
        self.providers.push(provider);
    }

    /// Remove every provider with the given id
    pub fn unregister(&mut self, provider_id: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| p.provider_id() != provider_id);
        self.providers.len() != before
    }

    /// First provider able to serve the request
    pub fn select(
        &self,
        resource_type: ResourceType,
        location: &ResourceLocation,
    ) -> Option<Rc<dyn ResourceProvider>> {
        self.providers
            .iter()
            .find(|p| p.can_provide(resource_type, location))
            .cloned()
    }

    /// Provider by id
    pub fn get(&self, provider_id: &str) -> Option<Rc<dyn ResourceProvider>> {
        self.providers
            .iter()
            .find(|p| p.provider_id() == provider_id)
            .cloned()
    }

    /// Registered provider ids, in precedence order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.provider_id())
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
