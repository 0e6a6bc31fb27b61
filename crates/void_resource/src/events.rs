//! Diagnostics events emitted by the resource manager
//!
//! Subscribers observe the operation lifecycle. Events are only built when at
//! least one subscriber is registered, so an empty subscriber list has no
//! effect on behaviour.

use crate::handle::{OperationStatus, UntypedHandle};

/// Lifecycle event
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceEvent {
    /// An operation was taken from the pool
    Created { handle: UntypedHandle, name: String },
    /// A reference was added
    Acquired { handle: UntypedHandle, refcount: u32 },
    /// A reference was dropped
    Released { handle: UntypedHandle, refcount: u32 },
    /// An operation reached a terminal status
    Completed {
        handle: UntypedHandle,
        name: String,
        status: OperationStatus,
    },
    /// An operation was returned to the pool
    Destroyed { handle: UntypedHandle, name: String },
    /// Pool occupancy changed
    PoolChanged { live: usize, free: usize },
}

impl ResourceEvent {
    /// Handle the event refers to, if any
    pub fn handle(&self) -> Option<UntypedHandle> {
        match self {
            Self::Created { handle, .. }
            | Self::Acquired { handle, .. }
            | Self::Released { handle, .. }
            | Self::Completed { handle, .. }
            | Self::Destroyed { handle, .. } => Some(*handle),
            Self::PoolChanged { .. } => None,
        }
    }
}

/// Event subscriber
pub type EventSubscriber = Box<dyn FnMut(&ResourceEvent)>;

/// Hook receiving the error of every failed operation
pub type ExceptionHandler = Box<dyn FnMut(UntypedHandle, &crate::error::ResourceError)>;
