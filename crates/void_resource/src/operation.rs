//! Operation slots - the pooled state behind every handle

use std::rc::Rc;
use std::sync::Arc;

use crate::error::ResourceError;
use crate::handle::{DownloadStatus, OperationStatus, ResourceType, ResourceValue, UntypedHandle};
use crate::location::{LocationCacheKey, ResourceLocation};
use crate::manager::ResourceManager;
use crate::provider::ResourceProvider;

/// Completion callback, invoked from [`ResourceManager::update`]
pub type CompletionCallback = Box<dyn FnOnce(&mut ResourceManager, UntypedHandle)>;

/// Destruction callback, invoked when the refcount reaches zero
pub type DestroyCallback = Box<dyn FnOnce(&mut ResourceManager, UntypedHandle)>;

/// Continuation of a chain operation. Receives the dependency handle (owned by
/// the chain) and returns a handle the chain takes ownership of.
pub type ChainContinuation = Box<dyn FnOnce(&mut ResourceManager, UntypedHandle) -> UntypedHandle>;

/// Per-member callback of a group operation: `(manager, member index, member)`
pub type GroupItemCallback = Box<dyn FnMut(&mut ResourceManager, usize, UntypedHandle)>;

/// Pool bucket an operation belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKindTag {
    /// Completed by host code
    Manual,
    /// Created already completed
    Completed,
    /// Provider-backed load of a location
    Provide,
    /// Continuation gated on one dependency
    Chain,
    /// Aggregate of many handles
    Group,
}

pub(crate) struct ProvideState {
    pub location: Arc<ResourceLocation>,
    pub provider: Rc<dyn ResourceProvider>,
    pub resource_type: ResourceType,
    pub cache_key: LocationCacheKey,
    /// Group over the location's dependencies
    pub dependencies: Option<UntypedHandle>,
    /// Set once the provider has been invoked
    pub executed: bool,
}

pub(crate) struct ChainState {
    pub dependency: UntypedHandle,
    pub wrapped: Option<UntypedHandle>,
    pub continuation: Option<ChainContinuation>,
    pub tolerate_failed_dependency: bool,
}

pub(crate) struct GroupState {
    pub members: Vec<UntypedHandle>,
    pub remaining: usize,
    pub fail_fast: bool,
    pub on_item: Option<GroupItemCallback>,
}

pub(crate) enum OperationKind {
    Manual,
    Completed,
    Provide(ProvideState),
    Chain(ChainState),
    Group(GroupState),
}

impl OperationKind {
    pub fn tag(&self) -> OperationKindTag {
        match self {
            Self::Manual => OperationKindTag::Manual,
            Self::Completed => OperationKindTag::Completed,
            Self::Provide(_) => OperationKindTag::Provide,
            Self::Chain(_) => OperationKindTag::Chain,
            Self::Group(_) => OperationKindTag::Group,
        }
    }

    pub fn debug_name(&self) -> String {
        match self {
            Self::Manual => "Operation".to_string(),
            Self::Completed => "CompletedOperation".to_string(),
            Self::Provide(state) => format!("Provide({})", state.location.primary_key()),
            Self::Chain(_) => "ChainOperation".to_string(),
            Self::Group(state) => format!("GroupOperation({})", state.members.len()),
        }
    }
}

/// State of one pooled operation
pub(crate) struct OperationSlot {
    pub version: u32,
    pub tag: OperationKindTag,
    pub in_use: bool,
    pub refcount: u32,
    pub status: OperationStatus,
    pub result: Option<ResourceValue>,
    pub error: Option<ResourceError>,
    pub kind: OperationKind,
    pub completed: Vec<CompletionCallback>,
    pub destroyed: Vec<DestroyCallback>,
    /// Queued for completion delivery in the next drain
    pub delivery_pending: bool,
    /// Destruction callbacks are running
    pub destroying: bool,
    /// Released while its provider was still working
    pub orphaned: bool,
    pub progress: f32,
    pub download: DownloadStatus,
}

impl OperationSlot {
    pub fn new(version: u32, kind: OperationKind) -> Self {
        Self {
            version,
            tag: kind.tag(),
            in_use: true,
            refcount: 1,
            status: OperationStatus::None,
            result: None,
            error: None,
            kind,
            completed: Vec::new(),
            destroyed: Vec::new(),
            delivery_pending: false,
            destroying: false,
            orphaned: false,
            progress: 0.0,
            download: DownloadStatus::default(),
        }
    }

    /// Reinitialize a recycled slot, keeping its version
    pub fn reuse(&mut self, kind: OperationKind) {
        let version = self.version;
        *self = Self::new(version, kind);
    }

    /// Drop all per-use state and mark the slot free
    pub fn clear(&mut self) {
        self.in_use = false;
        self.refcount = 0;
        self.status = OperationStatus::None;
        self.result = None;
        self.error = None;
        self.kind = OperationKind::Manual;
        self.completed.clear();
        self.destroyed.clear();
        self.delivery_pending = false;
        self.destroying = false;
        self.orphaned = false;
        self.progress = 0.0;
        self.download = DownloadStatus::default();
    }

    /// Valid for external use: live and referenced
    pub fn is_live(&self) -> bool {
        self.in_use && self.refcount > 0
    }

    /// Own progress, before dependencies are considered
    pub fn own_progress(&self) -> f32 {
        if self.status.is_done() {
            1.0
        } else if self.download.total_bytes > 0 {
            self.download.percent()
        } else {
            self.progress.clamp(0.0, 1.0)
        }
    }

    /// Own byte counts, before dependencies are considered
    pub fn own_download(&self) -> (u64, u64) {
        let total = self.download.total_bytes;
        let downloaded = if self.status == OperationStatus::Succeeded {
            total
        } else {
            self.download.downloaded_bytes.min(total)
        };
        (downloaded, total)
    }
}
