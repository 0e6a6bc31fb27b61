//! Resource Manager - Central operation bookkeeping
//!
//! The ResourceManager owns the operation pool and is the only way to touch an
//! operation. It supports:
//! - Reference counting with stale-handle detection
//! - Deferred completion callbacks, delivered from [`ResourceManager::update`]
//! - Poll-based providers through [`UpdateReceiver`]
//! - Diagnostics events and a process-wide exception hook

use std::collections::{HashMap, HashSet, VecDeque};
use std::iter;
use std::mem;
use std::rc::Rc;
use std::time::Instant;

use crate::config::ResourceManagerConfig;
use crate::error::{ResourceError, ResourceResult};
use crate::events::{EventSubscriber, ExceptionHandler, ResourceEvent};
use crate::handle::{DownloadStatus, Handle, OperationStatus, ResourceValue, UntypedHandle};
use crate::location::LocationCacheKey;
use crate::operation::{OperationKind, OperationKindTag, OperationSlot};
use crate::pool::{OperationPool, PoolStats};
use crate::provider::{ProviderRegistry, ResourceProvider};

/// Something that needs to be polled once per tick, typically a provider
/// observing work done on another thread
pub trait UpdateReceiver {
    /// Called from [`ResourceManager::update`]
    fn update(&self, rm: &mut ResourceManager, delta_time: f32);
}

/// The resource manager
pub struct ResourceManager {
    pub(crate) config: ResourceManagerConfig,
    pub(crate) pool: OperationPool,
    pub(crate) providers: ProviderRegistry,
    /// Location → in-flight or loaded provide operation
    pub(crate) cache: HashMap<LocationCacheKey, UntypedHandle>,
    /// Operations whose completion callbacks are due
    deferred: VecDeque<UntypedHandle>,
    update_receivers: Vec<Rc<dyn UpdateReceiver>>,
    exception_handler: Option<ExceptionHandler>,
    subscribers: Vec<EventSubscriber>,
    in_update: bool,
    frame: u64,
}

impl ResourceManager {
    /// Create a new resource manager
    pub fn new(config: ResourceManagerConfig) -> Self {
        Self {
            pool: OperationPool::with_capacity(config.initial_pool_capacity),
            config,
            providers: ProviderRegistry::new(),
            cache: HashMap::new(),
            deferred: VecDeque::new(),
            update_receivers: Vec::new(),
            exception_handler: None,
            subscribers: Vec::new(),
            in_update: false,
            frame: 0,
        }
    }

    /// Create with default configuration
    pub fn default_config() -> Self {
        Self::new(ResourceManagerConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &ResourceManagerConfig {
        &self.config
    }

    /// Number of completed update ticks
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ---- providers -------------------------------------------------------

    /// Register a shared provider
    pub fn register_provider(&mut self, provider: Rc<dyn ResourceProvider>) {
        log::debug!("registered provider `{}`", provider.provider_id());
        self.providers.register(provider);
    }

    /// Register a provider by value
    pub fn add_provider<P: ResourceProvider + 'static>(&mut self, provider: P) {
        self.register_provider(Rc::new(provider));
    }

    /// Register a provider that also needs polling every tick
    pub fn register_polled_provider<P>(&mut self, provider: Rc<P>)
    where
        P: ResourceProvider + UpdateReceiver + 'static,
    {
        self.register_provider(provider.clone());
        self.add_update_receiver(provider);
    }

    /// Remove providers by id
    pub fn unregister_provider(&mut self, provider_id: &str) -> bool {
        self.providers.unregister(provider_id)
    }

    /// Registered providers
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Add a receiver polled from [`update`](Self::update)
    pub fn add_update_receiver(&mut self, receiver: Rc<dyn UpdateReceiver>) {
        self.update_receivers.push(receiver);
    }

    /// Remove a previously added receiver
    pub fn remove_update_receiver(&mut self, receiver: &Rc<dyn UpdateReceiver>) -> bool {
        let before = self.update_receivers.len();
        self.update_receivers.retain(|r| !Rc::ptr_eq(r, receiver));
        self.update_receivers.len() != before
    }

    // ---- observability ---------------------------------------------------

    /// Install the hook that receives every failed operation's error
    pub fn set_exception_handler(
        &mut self,
        handler: impl FnMut(UntypedHandle, &ResourceError) + 'static,
    ) {
        self.exception_handler = Some(Box::new(handler));
    }

    /// Remove the exception hook
    pub fn clear_exception_handler(&mut self) {
        self.exception_handler = None;
    }

    /// Subscribe to lifecycle events
    pub fn subscribe_events(&mut self, subscriber: impl FnMut(&ResourceEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Pool statistics
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub(crate) fn emit(&mut self, build: impl FnOnce(&Self) -> ResourceEvent) {
        if self.subscribers.is_empty() {
            return;
        }
        let event = build(self);
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }

    fn emit_pool_changed(&mut self) {
        self.emit(|rm| {
            let stats = rm.pool.stats();
            ResourceEvent::PoolChanged {
                live: stats.live,
                free: stats.free,
            }
        });
    }

    fn report_exception(&mut self, handle: UntypedHandle, error: &ResourceError) {
        if let Some(handler) = self.exception_handler.as_mut() {
            handler(handle, error);
        } else if self.config.log_exceptions {
            log::error!("{} failed: {error}", self.debug_name(handle));
        }
    }

    // ---- queries ---------------------------------------------------------

    fn live_slot(&self, handle: UntypedHandle) -> ResourceResult<&OperationSlot> {
        self.pool.live(handle).ok_or(ResourceError::InvalidHandle(handle))
    }

    /// Valid iff the version matches and the refcount is above zero
    pub fn is_valid(&self, handle: impl Into<UntypedHandle>) -> bool {
        self.pool.live(handle.into()).is_some()
    }

    /// Current refcount, zero for stale handles
    pub fn reference_count(&self, handle: impl Into<UntypedHandle>) -> u32 {
        self.pool.get(handle.into()).map_or(0, |slot| slot.refcount)
    }

    /// Current status
    pub fn status(&self, handle: impl Into<UntypedHandle>) -> ResourceResult<OperationStatus> {
        Ok(self.live_slot(handle.into())?.status)
    }

    /// Error of a failed operation
    pub fn error(&self, handle: impl Into<UntypedHandle>) -> ResourceResult<Option<ResourceError>> {
        Ok(self.live_slot(handle.into())?.error.clone())
    }

    /// Type-erased result
    pub fn result_untyped(
        &self,
        handle: impl Into<UntypedHandle>,
    ) -> ResourceResult<Option<ResourceValue>> {
        Ok(self.live_slot(handle.into())?.result.clone())
    }

    /// Typed result
    pub fn result<T: 'static>(&self, handle: Handle<T>) -> ResourceResult<Option<Rc<T>>> {
        let raw = handle.untyped();
        match self.result_untyped(raw)? {
            None => Ok(None),
            Some(value) => value
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ResourceError::TypeMismatch {
                    handle: raw,
                    expected: core::any::type_name::<T>(),
                }),
        }
    }

    /// Human-readable name of the operation behind a handle
    pub fn debug_name(&self, handle: impl Into<UntypedHandle>) -> String {
        self.pool
            .get(handle.into())
            .map_or_else(|| "<released>".to_string(), |slot| slot.kind.debug_name())
    }

    /// Dependencies of an operation that are still valid
    pub fn dependencies(&self, handle: impl Into<UntypedHandle>) -> Vec<UntypedHandle> {
        let Some(slot) = self.pool.get(handle.into()) else {
            return Vec::new();
        };
        let candidates: Vec<UntypedHandle> = match &slot.kind {
            OperationKind::Provide(state) => state.dependencies.into_iter().collect(),
            OperationKind::Chain(state) => iter::once(state.dependency).chain(state.wrapped).collect(),
            OperationKind::Group(state) => state.members.clone(),
            OperationKind::Manual | OperationKind::Completed => Vec::new(),
        };
        candidates
            .into_iter()
            .filter(|dep| self.pool.live(*dep).is_some())
            .collect()
    }

    /// Progress in `[0, 1]`, including dependencies. An operation reachable
    /// through several paths is weighted once, on the first path that reaches it.
    pub fn percent_complete(&self, handle: impl Into<UntypedHandle>) -> f32 {
        let mut counted = HashSet::new();
        self.percent_inner(handle.into(), &mut counted).unwrap_or(1.0)
    }

    /// `None` if the operation was already counted
    fn percent_inner(&self, handle: UntypedHandle, counted: &mut HashSet<u32>) -> Option<f32> {
        if !counted.insert(handle.index()) {
            return None;
        }
        let Some(slot) = self.pool.get(handle) else {
            return Some(0.0);
        };
        if slot.status.is_done() {
            return Some(1.0);
        }

        let percent = match &slot.kind {
            OperationKind::Provide(state) => {
                let dependencies = state
                    .dependencies
                    .filter(|dep| self.pool.live(*dep).is_some())
                    .and_then(|dep| self.percent_inner(dep, counted));
                match dependencies {
                    Some(dependencies) => (dependencies + slot.own_progress()) / 2.0,
                    None => slot.own_progress(),
                }
            }
            OperationKind::Chain(state) => {
                let dependency = self.percent_inner(state.dependency, counted);
                let wrapped = match state.wrapped {
                    Some(wrapped) => self.percent_inner(wrapped, counted),
                    None => Some(0.0),
                };
                mean(dependency.into_iter().chain(wrapped))?
            }
            OperationKind::Group(state) if state.members.is_empty() => 1.0,
            OperationKind::Group(state) => mean(
                state
                    .members
                    .iter()
                    .filter_map(|member| self.percent_inner(*member, counted)),
            )?,
            OperationKind::Manual | OperationKind::Completed => slot.own_progress(),
        };
        Some(percent.clamp(0.0, 1.0))
    }

    /// Byte progress summed over the operation and its dependency graph.
    /// An operation reachable through several paths is counted once.
    pub fn download_status(&self, handle: impl Into<UntypedHandle>) -> DownloadStatus {
        let handle = handle.into();
        let mut visited = HashSet::new();
        let (downloaded_bytes, total_bytes) = self.download_inner(handle, &mut visited);
        DownloadStatus {
            total_bytes,
            downloaded_bytes,
            is_done: self
                .pool
                .get(handle)
                .is_some_and(|slot| slot.status.is_done()),
        }
    }

    fn download_inner(&self, handle: UntypedHandle, visited: &mut HashSet<u32>) -> (u64, u64) {
        if !visited.insert(handle.index()) {
            return (0, 0);
        }
        let Some(slot) = self.pool.get(handle) else {
            return (0, 0);
        };
        let (mut downloaded, mut total) = slot.own_download();
        for dep in self.dependencies(handle) {
            let (d, t) = self.download_inner(dep, visited);
            downloaded += d;
            total += t;
        }
        (downloaded, total)
    }

    // ---- reference counting ----------------------------------------------

    /// Take an additional reference
    pub fn acquire<T>(&mut self, handle: Handle<T>) -> ResourceResult<Handle<T>> {
        self.acquire_untyped(handle.untyped()).map(UntypedHandle::typed)
    }

    /// Take an additional reference on an untyped handle
    pub fn acquire_untyped(&mut self, handle: UntypedHandle) -> ResourceResult<UntypedHandle> {
        let slot = self
            .pool
            .get_mut(handle)
            .ok_or(ResourceError::InvalidHandle(handle))?;
        if slot.destroying {
            return Err(ResourceError::ReentrantMutation(handle));
        }
        if slot.refcount == 0 {
            return Err(ResourceError::InvalidHandle(handle));
        }
        slot.refcount += 1;
        let refcount = slot.refcount;
        log::trace!("acquire {handle:?} -> {refcount}");
        self.emit(|_| ResourceEvent::Acquired { handle, refcount });
        Ok(handle)
    }

    /// Drop a reference. At zero the operation is destroyed: its provider
    /// releases the result, its dependencies are released and the slot
    /// returns to the pool with a new version.
    pub fn release(&mut self, handle: impl Into<UntypedHandle>) -> ResourceResult<()> {
        let handle = handle.into();
        let slot = self
            .pool
            .get_mut(handle)
            .ok_or(ResourceError::InvalidHandle(handle))?;
        if slot.destroying {
            return Err(ResourceError::ReentrantMutation(handle));
        }
        if slot.refcount == 0 {
            return Err(ResourceError::InvalidHandle(handle));
        }
        slot.refcount -= 1;
        let refcount = slot.refcount;
        log::trace!("release {handle:?} -> {refcount}");
        self.emit(|_| ResourceEvent::Released { handle, refcount });

        if refcount == 0 {
            self.destroy(handle);
        }
        Ok(())
    }

    pub(crate) fn release_internal(&mut self, handle: UntypedHandle) {
        if let Err(err) = self.release(handle) {
            log::warn!("internal release of {handle:?} failed: {err}");
        }
    }

    fn destroy(&mut self, handle: UntypedHandle) {
        let callbacks = match self.pool.get_mut(handle) {
            Some(slot) => {
                slot.destroying = true;
                slot.completed.clear();
                mem::take(&mut slot.destroyed)
            }
            None => return,
        };
        for callback in callbacks {
            callback(self, handle);
        }

        let awaiting_provider = match self.pool.get_mut(handle) {
            Some(slot) => {
                slot.destroying = false;
                !slot.status.is_done()
                    && matches!(&slot.kind, OperationKind::Provide(state) if state.executed)
            }
            None => return,
        };

        if awaiting_provider {
            self.orphan(handle);
        } else {
            self.teardown(handle);
        }
    }

    /// The last handle went away while the provider is still working.
    /// Dependencies are released now; the provider release and the slot
    /// reclaim happen when the provider completes.
    fn orphan(&mut self, handle: UntypedHandle) {
        log::debug!("{handle:?} released before completion, provider release deferred");
        let (cache_key, dependencies) = match self.pool.get_mut(handle) {
            Some(slot) => {
                slot.orphaned = true;
                match &mut slot.kind {
                    OperationKind::Provide(state) => {
                        (Some(state.cache_key.clone()), state.dependencies.take())
                    }
                    _ => (None, None),
                }
            }
            None => return,
        };
        if let Some(key) = cache_key {
            self.forget_cached(&key, handle);
        }
        if let Some(dep) = dependencies {
            self.release_internal(dep);
        }
    }

    fn forget_cached(&mut self, key: &LocationCacheKey, handle: UntypedHandle) {
        if self.cache.get(key) == Some(&handle) {
            self.cache.remove(key);
        }
    }

    fn teardown(&mut self, handle: UntypedHandle) {
        let (kind, result) = match self.pool.get_mut(handle) {
            Some(slot) => (
                mem::replace(&mut slot.kind, OperationKind::Manual),
                slot.result.take(),
            ),
            None => return,
        };
        let name = if self.subscribers.is_empty() {
            String::new()
        } else {
            kind.debug_name()
        };

        match kind {
            OperationKind::Provide(state) => {
                self.forget_cached(&state.cache_key, handle);
                if state.executed && !state.provider.release(&state.location, result.as_ref()) {
                    log::warn!(
                        "provider `{}` failed to release `{}`",
                        state.provider.provider_id(),
                        state.location.primary_key()
                    );
                }
                if let Some(dep) = state.dependencies {
                    self.release_internal(dep);
                }
            }
            OperationKind::Chain(state) => {
                self.release_internal(state.dependency);
                if let Some(wrapped) = state.wrapped {
                    self.release_internal(wrapped);
                }
            }
            OperationKind::Group(state) => {
                for member in state.members {
                    self.release_internal(member);
                }
            }
            OperationKind::Manual | OperationKind::Completed => {}
        }
        drop(result);

        self.pool.reclaim(handle);
        log::trace!("destroyed {handle:?}");
        self.emit(|_| ResourceEvent::Destroyed { handle, name });
        self.emit_pool_changed();
    }

    // ---- callbacks -------------------------------------------------------

    /// Register a completion callback. It runs from the next
    /// [`update`](Self::update), even if the operation already completed.
    /// Callbacks of one operation run in registration order.
    pub fn on_completed<T: 'static>(
        &mut self,
        handle: Handle<T>,
        callback: impl FnOnce(&mut ResourceManager, Handle<T>) + 'static,
    ) -> ResourceResult<()> {
        self.on_completed_untyped(handle.untyped(), move |rm, raw| callback(rm, raw.typed()))
    }

    /// Register an untyped completion callback
    pub fn on_completed_untyped(
        &mut self,
        handle: UntypedHandle,
        callback: impl FnOnce(&mut ResourceManager, UntypedHandle) + 'static,
    ) -> ResourceResult<()> {
        let slot = self
            .pool
            .get_mut(handle)
            .filter(|slot| slot.is_live())
            .ok_or(ResourceError::InvalidHandle(handle))?;
        slot.completed.push(Box::new(callback));
        if slot.status.is_done() {
            self.schedule_delivery(handle);
        }
        Ok(())
    }

    /// Register a callback run when the refcount reaches zero. Acquiring or
    /// releasing the operation from inside it fails with `ReentrantMutation`.
    pub fn on_destroyed(
        &mut self,
        handle: impl Into<UntypedHandle>,
        callback: impl FnOnce(&mut ResourceManager, UntypedHandle) + 'static,
    ) -> ResourceResult<()> {
        let handle = handle.into();
        let slot = self
            .pool
            .get_mut(handle)
            .filter(|slot| slot.is_live())
            .ok_or(ResourceError::InvalidHandle(handle))?;
        slot.destroyed.push(Box::new(callback));
        Ok(())
    }

    fn schedule_delivery(&mut self, handle: UntypedHandle) {
        if let Some(slot) = self.pool.get_mut(handle) {
            if !slot.delivery_pending {
                slot.delivery_pending = true;
                self.deferred.push_back(handle);
            }
        }
    }

    fn drain_deferred(&mut self) {
        while let Some(handle) = self.deferred.pop_front() {
            let callbacks = match self.pool.get_mut(handle) {
                Some(slot) => {
                    slot.delivery_pending = false;
                    mem::take(&mut slot.completed)
                }
                None => continue,
            };
            for callback in callbacks {
                callback(self, handle);
            }
        }
    }

    // ---- operation creation and completion -------------------------------

    pub(crate) fn allocate(&mut self, kind: OperationKind) -> UntypedHandle {
        let handle = self.pool.acquire(kind);
        self.emit(|rm| ResourceEvent::Created {
            handle,
            name: rm.debug_name(handle),
        });
        self.emit_pool_changed();
        handle
    }

    pub(crate) fn set_running(&mut self, handle: UntypedHandle) {
        if let Some(slot) = self.pool.get_mut(handle) {
            slot.status = OperationStatus::Running;
        }
    }

    /// Create a running operation completed later by host code
    pub fn create_operation<T: 'static>(&mut self) -> Handle<T> {
        let handle = self.allocate(OperationKind::Manual);
        self.set_running(handle);
        handle.typed()
    }

    /// Create an operation that already succeeded with `value`
    pub fn create_completed_operation<T: 'static>(&mut self, value: T) -> Handle<T> {
        self.create_completed_operation_raw(Some(Rc::new(value)), true, None)
            .typed()
    }

    /// Create an operation that already failed with `error`
    pub fn create_failed_operation<T: 'static>(&mut self, error: ResourceError) -> Handle<T> {
        self.create_completed_operation_raw(None, false, Some(error))
            .typed()
    }

    /// Create an already-completed operation from raw parts
    pub fn create_completed_operation_raw(
        &mut self,
        result: Option<ResourceValue>,
        success: bool,
        error: Option<ResourceError>,
    ) -> UntypedHandle {
        let handle = self.allocate(OperationKind::Completed);
        self.set_running(handle);
        if let Err(err) = self.complete_raw(handle, result, success, error) {
            log::error!("failed to complete fresh operation {handle:?}: {err}");
        }
        handle
    }

    /// Complete successfully with a value
    pub fn complete<T: 'static>(&mut self, handle: Handle<T>, value: T) -> ResourceResult<()> {
        self.complete_raw(handle.untyped(), Some(Rc::new(value)), true, None)
    }

    /// Complete with an error
    pub fn fail<T>(&mut self, handle: Handle<T>, error: ResourceError) -> ResourceResult<()> {
        self.complete_raw(handle.untyped(), None, false, Some(error))
    }

    /// Complete an operation. Allowed once per operation. Callbacks are not
    /// invoked here; they are delivered from the next update.
    pub fn complete_raw(
        &mut self,
        handle: UntypedHandle,
        result: Option<ResourceValue>,
        success: bool,
        error: Option<ResourceError>,
    ) -> ResourceResult<()> {
        let slot = self
            .pool
            .get_mut(handle)
            .ok_or(ResourceError::InvalidHandle(handle))?;
        if slot.refcount == 0 && !slot.orphaned {
            return Err(ResourceError::InvalidHandle(handle));
        }
        if slot.status.is_done() {
            log::error!("attempted to complete {handle:?} more than once");
            return Err(ResourceError::AlreadyCompleted(handle));
        }

        slot.status = if success {
            OperationStatus::Succeeded
        } else {
            OperationStatus::Failed
        };
        slot.result = result;
        slot.error = if success {
            None
        } else {
            Some(error.unwrap_or_else(|| {
                ResourceError::Failed("operation failed without an error".to_string())
            }))
        };
        slot.download.is_done = true;
        let status = slot.status;
        let failure = slot.error.clone();
        let orphaned = slot.orphaned;

        self.emit(|rm| ResourceEvent::Completed {
            handle,
            name: rm.debug_name(handle),
            status,
        });
        if let Some(error) = failure {
            self.report_exception(handle, &error);
        }

        if orphaned {
            self.teardown(handle);
        } else {
            self.schedule_delivery(handle);
        }
        Ok(())
    }

    /// Report fractional progress on a running operation
    pub fn set_progress(&mut self, handle: impl Into<UntypedHandle>, progress: f32) {
        if let Some(slot) = self.pool.get_mut(handle.into()) {
            slot.progress = progress.clamp(0.0, 1.0);
        }
    }

    /// Report byte progress on a running operation
    pub fn set_download_status(
        &mut self,
        handle: impl Into<UntypedHandle>,
        downloaded_bytes: u64,
        total_bytes: u64,
    ) {
        if let Some(slot) = self.pool.get_mut(handle.into()) {
            slot.download.total_bytes = total_bytes;
            slot.download.downloaded_bytes = downloaded_bytes.min(total_bytes);
        }
    }

    // ---- execution -------------------------------------------------------

    /// Mark running and execute once `dependency` is terminal
    pub(crate) fn start_operation(&mut self, handle: UntypedHandle, dependency: Option<UntypedHandle>) {
        self.set_running(handle);
        let waiting = dependency
            .filter(|dep| self.pool.live(*dep).is_some_and(|slot| !slot.status.is_done()));
        match waiting {
            Some(dep) => {
                if let Err(err) = self.on_completed_untyped(dep, move |rm, _| rm.execute(handle)) {
                    log::warn!("{handle:?} could not wait on {dep:?}: {err}");
                    self.execute(handle);
                }
            }
            None => self.execute(handle),
        }
    }

    fn execute(&mut self, handle: UntypedHandle) {
        let tag = match self.pool.get(handle) {
            Some(slot) if slot.status == OperationStatus::Running && !slot.orphaned => slot.tag,
            _ => return,
        };
        match tag {
            OperationKindTag::Provide => self.execute_provide(handle),
            OperationKindTag::Chain => self.execute_chain(handle),
            OperationKindTag::Manual | OperationKindTag::Completed | OperationKindTag::Group => {}
        }
    }

    // ---- update pump -----------------------------------------------------

    /// Advance one tick: deliver due completion callbacks, poll update
    /// receivers, then deliver whatever they completed.
    pub fn update(&mut self, delta_time: f32) {
        if self.in_update {
            log::error!("ResourceManager::update called re-entrantly; ignoring");
            return;
        }
        self.in_update = true;
        self.frame += 1;

        self.drain_deferred();
        if !self.update_receivers.is_empty() {
            let receivers = self.update_receivers.clone();
            for receiver in &receivers {
                receiver.update(self, delta_time);
            }
            self.drain_deferred();
        }

        self.in_update = false;
    }

    /// Block until the operation is terminal and its callbacks delivered,
    /// pumping [`update`](Self::update). Not callable from inside an update.
    pub fn wait_for_completion(
        &mut self,
        handle: impl Into<UntypedHandle>,
    ) -> ResourceResult<OperationStatus> {
        let handle = handle.into();
        if self.in_update {
            return Err(ResourceError::ReentrantMutation(handle));
        }
        let timeout = self.config.wait_timeout();
        let started = Instant::now();
        loop {
            let slot = self.live_slot(handle)?;
            if slot.status.is_done() && !slot.delivery_pending {
                return Ok(slot.status);
            }
            if started.elapsed() >= timeout {
                return Err(ResourceError::WaitTimeout(handle));
            }
            self.update(0.0);
            std::thread::yield_now();
        }
    }
}

fn mean(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f32)
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_completed_operation_lifecycle() {
        let mut rm = ResourceManager::default();
        let handle = rm.create_completed_operation(42u32);

        assert_eq!(rm.status(handle).unwrap(), OperationStatus::Succeeded);
        assert_eq!(*rm.result(handle).unwrap().unwrap(), 42);
        assert_eq!(rm.percent_complete(handle), 1.0);

        rm.release(handle).unwrap();
        assert!(!rm.is_valid(handle));
        assert_eq!(rm.pool_stats().live, 0);
    }

    #[test]
    fn test_type_mismatch() {
        let mut rm = ResourceManager::default();
        let handle = rm.create_completed_operation(String::from("text"));
        let wrong: Handle<u32> = handle.cast();

        assert!(matches!(
            rm.result(wrong),
            Err(ResourceError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_events_are_emitted() {
        let mut rm = ResourceManager::default();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        rm.subscribe_events(move |event| sink.borrow_mut().push(event.clone()));

        let handle = rm.create_operation::<u32>();
        rm.complete(handle, 1).unwrap();
        rm.release(handle).unwrap();

        let events = events.borrow();
        assert!(matches!(events.first(), Some(ResourceEvent::Created { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ResourceEvent::Completed { status: OperationStatus::Succeeded, .. }
        )));
        assert!(events.iter().any(|e| matches!(e, ResourceEvent::Destroyed { .. })));
        assert!(matches!(
            events.last(),
            Some(ResourceEvent::PoolChanged { live: 0, free: 1 })
        ));
    }

    #[test]
    fn test_exception_handler_receives_failures() {
        let mut rm = ResourceManager::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        rm.set_exception_handler(move |handle, error| sink.borrow_mut().push((handle, error.clone())));

        let handle = rm.create_failed_operation::<u32>(ResourceError::Failed("boom".into()));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, handle.untyped());
        assert_eq!(seen[0].1, ResourceError::Failed("boom".into()));
        assert_eq!(rm.status(handle).unwrap(), OperationStatus::Failed);
    }
}
