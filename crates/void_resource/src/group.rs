//! Group operations - one handle over many
//!
//! A group holds a reference to every member and completes once all of them
//! are terminal. Its result is the member list; a group whose members failed
//! still succeeds unless it was created with `fail_fast`.

use std::rc::Rc;

use crate::error::{ResourceError, ResourceResult};
use crate::handle::{Handle, OperationStatus, UntypedHandle};
use crate::manager::ResourceManager;
use crate::operation::{GroupItemCallback, GroupState, OperationKind};

/// Group options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupOptions {
    /// Fail as soon as any member fails
    pub fail_fast: bool,
}

impl ResourceManager {
    /// Group existing handles. Each member gains a reference owned by the group.
    pub fn create_group_operation(
        &mut self,
        handles: &[UntypedHandle],
        options: GroupOptions,
    ) -> ResourceResult<Handle<Vec<UntypedHandle>>> {
        let members = self.acquire_all(handles)?;
        Ok(self.create_group(members, options, None).typed())
    }

    /// Group existing handles, calling `on_item` as each member completes
    pub fn create_group_operation_with_callback(
        &mut self,
        handles: &[UntypedHandle],
        options: GroupOptions,
        on_item: impl FnMut(&mut ResourceManager, usize, UntypedHandle) + 'static,
    ) -> ResourceResult<Handle<Vec<UntypedHandle>>> {
        let members = self.acquire_all(handles)?;
        Ok(self
            .create_group(members, options, Some(Box::new(on_item)))
            .typed())
    }

    /// Group handles whose references move into the group
    pub fn create_group_operation_owned(
        &mut self,
        handles: Vec<UntypedHandle>,
        options: GroupOptions,
    ) -> Handle<Vec<UntypedHandle>> {
        self.create_group(handles, options, None).typed()
    }

    /// Members of a group operation
    pub fn group_members(&self, handle: impl Into<UntypedHandle>) -> Vec<UntypedHandle> {
        match self.pool.get(handle.into()).map(|slot| &slot.kind) {
            Some(OperationKind::Group(state)) => state.members.clone(),
            _ => Vec::new(),
        }
    }

    fn acquire_all(&mut self, handles: &[UntypedHandle]) -> ResourceResult<Vec<UntypedHandle>> {
        let mut acquired = Vec::with_capacity(handles.len());
        for &handle in handles {
            match self.acquire_untyped(handle) {
                Ok(handle) => acquired.push(handle),
                Err(err) => {
                    for handle in acquired {
                        self.release_internal(handle);
                    }
                    return Err(err);
                }
            }
        }
        Ok(acquired)
    }

    pub(crate) fn create_group(
        &mut self,
        members: Vec<UntypedHandle>,
        options: GroupOptions,
        on_item: Option<GroupItemCallback>,
    ) -> UntypedHandle {
        let count = members.len();
        let handle = self.allocate(OperationKind::Group(GroupState {
            members: members.clone(),
            remaining: count,
            fail_fast: options.fail_fast,
            on_item,
        }));
        self.set_running(handle);

        if count == 0 {
            self.finish_group(handle, true, None);
            return handle;
        }

        for (index, member) in members.into_iter().enumerate() {
            let subscribed = self.on_completed_untyped(member, move |rm, member| {
                rm.on_group_member_completed(handle, index, member)
            });
            if let Err(err) = subscribed {
                log::warn!("group {handle:?} member {index} is unusable: {err}");
                self.on_group_member_completed(handle, index, member);
            }
        }
        handle
    }

    fn on_group_member_completed(&mut self, handle: UntypedHandle, index: usize, member: UntypedHandle) {
        let (remaining, fail_fast, on_item) = match self.pool.get_mut(handle) {
            Some(slot) if slot.is_live() && slot.status == OperationStatus::Running => {
                match &mut slot.kind {
                    OperationKind::Group(state) => {
                        state.remaining = state.remaining.saturating_sub(1);
                        (state.remaining, state.fail_fast, state.on_item.take())
                    }
                    _ => return,
                }
            }
            _ => return,
        };

        if let Some(mut callback) = on_item {
            callback(self, index, member);
            if let Some(OperationKind::Group(state)) = self.pool.get_mut(handle).map(|slot| &mut slot.kind) {
                state.on_item = Some(callback);
            }
        }

        let failure = match self.pool.live(member) {
            Some(slot) if slot.status == OperationStatus::Succeeded => None,
            Some(slot) => Some(
                slot.error
                    .as_ref()
                    .map_or_else(|| "failed".to_string(), ToString::to_string),
            ),
            None => Some("released".to_string()),
        };

        match failure {
            Some(reason) if fail_fast => {
                let error = ResourceError::DependencyFailed {
                    location: self.debug_name(handle),
                    failed: vec![format!("member {index}: {reason}")],
                };
                self.finish_group(handle, false, Some(error));
            }
            _ if remaining == 0 => self.finish_group(handle, true, None),
            _ => {}
        }
    }

    fn finish_group(&mut self, handle: UntypedHandle, success: bool, error: Option<ResourceError>) {
        let members = match self.pool.get(handle) {
            Some(slot) if slot.status == OperationStatus::Running => match &slot.kind {
                OperationKind::Group(state) => state.members.clone(),
                _ => return,
            },
            _ => return,
        };
        if let Err(err) = self.complete_raw(handle, Some(Rc::new(members)), success, error) {
            log::warn!("could not complete group {handle:?}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_group_succeeds_immediately() {
        let mut rm = ResourceManager::default();
        let group = rm.create_group_operation_owned(Vec::new(), GroupOptions::default());

        assert_eq!(rm.status(group).unwrap(), OperationStatus::Succeeded);
        assert!(rm.result(group).unwrap().unwrap().is_empty());
        assert_eq!(rm.percent_complete(group), 1.0);
    }

    #[test]
    fn test_group_rejects_stale_member() {
        let mut rm = ResourceManager::default();
        let live = rm.create_operation::<u32>();
        let stale = rm.create_operation::<u32>();
        rm.release(stale).unwrap();

        let result = rm.create_group_operation(&[live.untyped(), stale.untyped()], GroupOptions::default());
        assert_eq!(result, Err(ResourceError::InvalidHandle(stale.untyped())));
        // The reference taken on `live` was rolled back
        assert_eq!(rm.reference_count(live), 1);
    }
}
