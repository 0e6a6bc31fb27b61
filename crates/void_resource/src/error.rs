//! Error types for resource operations

use thiserror::Error;

use crate::handle::UntypedHandle;

/// Errors produced by operations, providers and handle misuse.
///
/// Provider and dependency failures are stored on the failed operation and
/// surfaced through its status. Handle misuse (`InvalidHandle`,
/// `ReentrantMutation`) is returned directly to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    /// No registered provider accepts the location and requested type
    #[error("no provider can supply `{type_name}` for `{location}` (provider id `{provider_id}`)")]
    UnknownProvider {
        location: String,
        provider_id: String,
        type_name: &'static str,
    },

    /// One or more dependencies failed and the consumer cannot tolerate it
    #[error("dependencies of `{location}` failed: {}", failed.join(", "))]
    DependencyFailed { location: String, failed: Vec<String> },

    /// The handle's version no longer matches, or its refcount is already zero
    #[error("handle {0:?} is no longer valid")]
    InvalidHandle(UntypedHandle),

    /// Acquire or release was called on an operation while it was being destroyed
    #[error("operation {0:?} was acquired or released from its own destruction callback")]
    ReentrantMutation(UntypedHandle),

    /// A provider reported a failure while loading a location
    #[error("provider `{provider_id}` failed to load `{location}`: {message}")]
    ProviderFailed {
        provider_id: String,
        location: String,
        message: String,
    },

    /// No location is registered for the requested key
    #[error("no location found for key `{0}`")]
    InvalidKey(String),

    /// `complete` was called on an operation that already reached a terminal state
    #[error("operation {0:?} was already completed")]
    AlreadyCompleted(UntypedHandle),

    /// A typed result query did not match the stored result type
    #[error("result of {handle:?} is not a `{expected}`")]
    TypeMismatch {
        handle: UntypedHandle,
        expected: &'static str,
    },

    /// A synchronous wait exceeded the configured timeout
    #[error("timed out waiting for {0:?} to complete")]
    WaitTimeout(UntypedHandle),

    /// Generic failure
    #[error("{0}")]
    Failed(String),
}

impl ResourceError {
    /// True for errors caused by misusing a handle rather than by a failed load
    pub fn is_handle_misuse(&self) -> bool {
        matches!(self, Self::InvalidHandle(_) | Self::ReentrantMutation(_))
    }
}

impl From<&str> for ResourceError {
    fn from(s: &str) -> Self {
        Self::Failed(s.to_string())
    }
}

impl From<String> for ResourceError {
    fn from(s: String) -> Self {
        Self::Failed(s)
    }
}

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;
