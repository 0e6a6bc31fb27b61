//! Operation Handle - Versioned references to pooled operations
//!
//! Handles provide safe access to operations with:
//! - Generation (version) checks against the operation pool
//! - Explicit reference counting through the resource manager
//! - Typed and untyped views of the same operation

use core::any::{Any, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use std::rc::Rc;

use crate::error::ResourceResult;
use crate::manager::ResourceManager;

/// Type-erased result value stored on a completed operation
pub type ResourceValue = Rc<dyn Any>;

/// Status of an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OperationStatus {
    /// Operation has not started
    #[default]
    None = 0,
    /// Operation is waiting on dependencies or a provider
    Running = 1,
    /// Operation completed with a result
    Succeeded = 2,
    /// Operation completed with an error
    Failed = 3,
}

impl OperationStatus {
    /// Check if the status is terminal
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl From<u8> for OperationStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Succeeded,
            3 => Self::Failed,
            _ => Self::None,
        }
    }
}

/// Byte-level progress for operations that stream data
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DownloadStatus {
    /// Total bytes expected
    pub total_bytes: u64,
    /// Bytes received so far
    pub downloaded_bytes: u64,
    /// Whether the operation has finished
    pub is_done: bool,
}

impl DownloadStatus {
    /// Fraction of bytes received, in `[0, 1]`
    pub fn percent(&self) -> f32 {
        if self.total_bytes > 0 {
            (self.downloaded_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0) as f32
        } else if self.is_done {
            1.0
        } else {
            0.0
        }
    }
}

/// The requested result type of a provide call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceType {
    /// Type identity
    pub id: TypeId,
    /// Type name for diagnostics
    pub name: &'static str,
}

impl ResourceType {
    /// Resource type for `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Untyped request, used for dependency loads
    pub fn any() -> Self {
        Self::of::<dyn Any>()
    }

    /// True for untyped requests
    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<dyn Any>()
    }

    /// True if this is `T` or an untyped request
    pub fn accepts<T: 'static>(&self) -> bool {
        self.is_any() || self.id == TypeId::of::<T>()
    }
}

/// Untyped handle: pool index plus the version it was issued against
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UntypedHandle {
    index: u32,
    version: u32,
}

impl UntypedHandle {
    pub(crate) const fn new(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    /// Pool slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Version the handle was issued against
    #[inline]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// View as a typed handle. Result access is checked at query time.
    #[inline]
    pub const fn typed<T>(self) -> Handle<T> {
        Handle {
            raw: self,
            _marker: PhantomData,
        }
    }

    /// Check validity against a manager
    pub fn is_valid(&self, rm: &ResourceManager) -> bool {
        rm.is_valid(*self)
    }

    /// Current status
    pub fn status(&self, rm: &ResourceManager) -> ResourceResult<OperationStatus> {
        rm.status(*self)
    }

    /// Increment the refcount
    pub fn acquire(&self, rm: &mut ResourceManager) -> ResourceResult<UntypedHandle> {
        rm.acquire_untyped(*self)
    }

    /// Decrement the refcount
    pub fn release(self, rm: &mut ResourceManager) -> ResourceResult<()> {
        rm.release(self)
    }
}

impl fmt::Debug for UntypedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op({}v{})", self.index, self.version)
    }
}

/// Typed handle to an operation producing `T`
///
/// Handles are capability tokens: copying one does not change the refcount.
/// Use [`ResourceManager::acquire`] to take an additional reference.
#[repr(transparent)]
pub struct Handle<T> {
    raw: UntypedHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Erase the result type
    #[inline]
    pub const fn untyped(self) -> UntypedHandle {
        self.raw
    }

    /// Pool slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.raw.index
    }

    /// Version the handle was issued against
    #[inline]
    pub const fn version(&self) -> u32 {
        self.raw.version
    }

    /// Reinterpret as a handle of a different result type
    #[inline]
    pub const fn cast<U>(self) -> Handle<U> {
        self.raw.typed()
    }
}

impl<T: 'static> Handle<T> {
    /// Check validity against a manager
    pub fn is_valid(&self, rm: &ResourceManager) -> bool {
        rm.is_valid(self.raw)
    }

    /// Current status
    pub fn status(&self, rm: &ResourceManager) -> ResourceResult<OperationStatus> {
        rm.status(self.raw)
    }

    /// The result, once the operation succeeded
    pub fn result(&self, rm: &ResourceManager) -> ResourceResult<Option<Rc<T>>> {
        rm.result(*self)
    }

    /// Progress in `[0, 1]`
    pub fn percent_complete(&self, rm: &ResourceManager) -> f32 {
        rm.percent_complete(self.raw)
    }

    /// Aggregated byte progress
    pub fn download_status(&self, rm: &ResourceManager) -> DownloadStatus {
        rm.download_status(self.raw)
    }

    /// Increment the refcount
    pub fn acquire(&self, rm: &mut ResourceManager) -> ResourceResult<Handle<T>> {
        rm.acquire(*self)
    }

    /// Decrement the refcount
    pub fn release(self, rm: &mut ResourceManager) -> ResourceResult<()> {
        rm.release(self)
    }
}

// Manual trait implementations to avoid T bounds
impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle<{}>({}v{})",
            core::any::type_name::<T>(),
            self.raw.index,
            self.raw.version
        )
    }
}

impl<T> From<Handle<T>> for UntypedHandle {
    fn from(handle: Handle<T>) -> Self {
        handle.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestAsset;

    #[test]
    fn test_handle_roundtrip_through_untyped() {
        let raw = UntypedHandle::new(7, 3);
        let handle: Handle<TestAsset> = raw.typed();

        assert_eq!(handle.index(), 7);
        assert_eq!(handle.version(), 3);
        assert_eq!(handle.untyped(), raw);
        assert_eq!(UntypedHandle::from(handle), raw);
    }

    #[test]
    fn test_handle_equality_includes_version() {
        let a: Handle<TestAsset> = UntypedHandle::new(1, 1).typed();
        let b: Handle<TestAsset> = UntypedHandle::new(1, 2).typed();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_download_status_percent() {
        let empty = DownloadStatus::default();
        assert_eq!(empty.percent(), 0.0);

        let done = DownloadStatus { is_done: true, ..Default::default() };
        assert_eq!(done.percent(), 1.0);

        let half = DownloadStatus {
            total_bytes: 200,
            downloaded_bytes: 100,
            is_done: false,
        };
        assert!((half.percent() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_resource_type_accepts() {
        assert!(ResourceType::any().accepts::<String>());
        assert!(ResourceType::of::<String>().accepts::<String>());
        assert!(!ResourceType::of::<u32>().accepts::<String>());
    }

    #[test]
    fn test_status_is_done() {
        assert!(!OperationStatus::None.is_done());
        assert!(!OperationStatus::Running.is_done());
        assert!(OperationStatus::Succeeded.is_done());
        assert!(OperationStatus::Failed.is_done());
        assert_eq!(OperationStatus::from(2), OperationStatus::Succeeded);
    }
}
