//! Chain operations - a continuation gated on one dependency
//!
//! The chain holds a reference to its dependency. When the dependency is
//! terminal the continuation runs once and returns a new handle; the chain
//! completes with whatever that handle completes with.

use crate::error::{ResourceError, ResourceResult};
use crate::handle::{Handle, OperationStatus, UntypedHandle};
use crate::manager::ResourceManager;
use crate::operation::{ChainContinuation, ChainState, OperationKind};

/// Chain options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainOptions {
    /// Run the continuation even if the dependency failed
    pub tolerate_failed_dependency: bool,
}

impl ChainOptions {
    /// Options that run the continuation regardless of the dependency status
    pub const fn tolerant() -> Self {
        Self {
            tolerate_failed_dependency: true,
        }
    }
}

impl ResourceManager {
    /// Chain `continuation` after `dependency`. If the dependency fails the
    /// continuation is skipped and the chain fails with
    /// [`ResourceError::DependencyFailed`].
    pub fn create_chain_operation<T: 'static, D: 'static>(
        &mut self,
        dependency: Handle<D>,
        continuation: impl FnOnce(&mut ResourceManager, Handle<D>) -> Handle<T> + 'static,
    ) -> ResourceResult<Handle<T>> {
        self.create_chain_operation_with(dependency, ChainOptions::default(), continuation)
    }

    /// Chain with explicit options
    pub fn create_chain_operation_with<T: 'static, D: 'static>(
        &mut self,
        dependency: Handle<D>,
        options: ChainOptions,
        continuation: impl FnOnce(&mut ResourceManager, Handle<D>) -> Handle<T> + 'static,
    ) -> ResourceResult<Handle<T>> {
        let continuation: ChainContinuation =
            Box::new(move |rm, dep| continuation(rm, dep.typed()).untyped());
        self.create_chain_untyped(dependency.untyped(), options, continuation)
            .map(UntypedHandle::typed)
    }

    pub(crate) fn create_chain_untyped(
        &mut self,
        dependency: UntypedHandle,
        options: ChainOptions,
        continuation: ChainContinuation,
    ) -> ResourceResult<UntypedHandle> {
        let dependency = self.acquire_untyped(dependency)?;
        let handle = self.allocate(OperationKind::Chain(ChainState {
            dependency,
            wrapped: None,
            continuation: Some(continuation),
            tolerate_failed_dependency: options.tolerate_failed_dependency,
        }));
        self.start_operation(handle, Some(dependency));
        Ok(handle)
    }

    pub(crate) fn execute_chain(&mut self, handle: UntypedHandle) {
        let (dependency, continuation, tolerate) =
            match self.pool.get_mut(handle).map(|slot| &mut slot.kind) {
                Some(OperationKind::Chain(state)) => (
                    state.dependency,
                    state.continuation.take(),
                    state.tolerate_failed_dependency,
                ),
                _ => return,
            };
        let Some(continuation) = continuation else {
            return;
        };

        let outcome = self
            .pool
            .live(dependency)
            .map(|slot| (slot.status, slot.error.clone()));
        let succeeded = matches!(outcome, Some((OperationStatus::Succeeded, _)));
        if !succeeded && !tolerate {
            let reason = match outcome {
                Some((_, Some(error))) => error.to_string(),
                Some(_) => "dependency did not succeed".to_string(),
                None => "dependency was released".to_string(),
            };
            let error = ResourceError::DependencyFailed {
                location: self.debug_name(dependency),
                failed: vec![reason],
            };
            if let Err(err) = self.complete_raw(handle, None, false, Some(error)) {
                log::warn!("could not fail {handle:?}: {err}");
            }
            return;
        }

        let wrapped = continuation(self, dependency);

        let attached = match self.pool.get_mut(handle) {
            Some(slot) if slot.is_live() && !slot.status.is_done() => match &mut slot.kind {
                OperationKind::Chain(state) => {
                    state.wrapped = Some(wrapped);
                    true
                }
                _ => false,
            },
            _ => false,
        };
        if !attached {
            // The chain went away while the continuation ran
            if self.is_valid(wrapped) {
                self.release_internal(wrapped);
            }
            return;
        }

        let subscribed = self.on_completed_untyped(wrapped, move |rm, wrapped| {
            rm.forward_chain_completion(handle, wrapped)
        });
        if let Err(error) = subscribed {
            if let Err(err) = self.complete_raw(handle, None, false, Some(error)) {
                log::warn!("could not fail {handle:?}: {err}");
            }
        }
    }

    fn forward_chain_completion(&mut self, handle: UntypedHandle, wrapped: UntypedHandle) {
        let running = self
            .pool
            .get(handle)
            .is_some_and(|slot| slot.is_live() && slot.status == OperationStatus::Running);
        if !running {
            return;
        }
        let (success, result, error) = match self.pool.live(wrapped) {
            Some(slot) => (
                slot.status == OperationStatus::Succeeded,
                slot.result.clone(),
                slot.error.clone(),
            ),
            None => (false, None, Some(ResourceError::InvalidHandle(wrapped))),
        };
        if let Err(err) = self.complete_raw(handle, result, success, error) {
            log::warn!("could not complete chain {handle:?}: {err}");
        }
    }
}
