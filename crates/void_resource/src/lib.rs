//! # void_resource - Resource Lifecycle Engine
//!
//! Refcounted asynchronous resource loading with:
//! - Versioned handles over pooled, recycled operations
//! - Pluggable providers (register at runtime)
//! - Chain and group composition
//! - Dependency-aware provide with per-location deduplication
//! - Tick-driven completion callbacks
//!
//! ## Example
//!
//! ```ignore
//! use void_resource::prelude::*;
//!
//! let source: Arc<dyn ContentSource> = Arc::new(FileSystemSource::with_root("content"));
//!
//! // Create the manager and register a provider
//! let mut rm = ResourceManager::default();
//! rm.add_provider(TextDataProvider::new(source));
//!
//! // Load a location
//! let location = ResourceLocation::new("intro", "intro.txt", TEXT_DATA_PROVIDER_ID).shared();
//! let handle: Handle<String> = rm.provide(&location);
//!
//! rm.on_completed(handle, |rm, handle| {
//!     if let Ok(Some(text)) = rm.result(handle) {
//!         println!("{text}");
//!     }
//! })?;
//!
//! // Deliver callbacks each frame
//! rm.update(delta_time);
//!
//! // Unload
//! rm.release(handle)?;
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod group;
pub mod handle;
pub mod location;
pub mod manager;
pub mod operation;
pub mod pool;
pub mod provide;
pub mod provider;
pub mod providers;
pub mod source;

pub use chain::ChainOptions;
pub use config::ResourceManagerConfig;
pub use error::{ResourceError, ResourceResult};
pub use events::{EventSubscriber, ExceptionHandler, ResourceEvent};
pub use group::GroupOptions;
pub use handle::{DownloadStatus, Handle, OperationStatus, ResourceType, ResourceValue, UntypedHandle};
pub use location::ResourceLocation;
pub use manager::{ResourceManager, UpdateReceiver};
pub use operation::OperationKindTag;
pub use pool::PoolStats;
pub use provider::{ProvideRequest, ProviderBehaviourFlags, ProviderRegistry, ResourceProvider};
pub use source::{ContentSource, FileSystemSource, MemorySource};

/// Prelude - commonly used types
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::chain::ChainOptions;
    pub use crate::error::{ResourceError, ResourceResult};
    pub use crate::group::GroupOptions;
    pub use crate::handle::{Handle, OperationStatus, ResourceType, UntypedHandle};
    pub use crate::location::ResourceLocation;
    pub use crate::manager::{ResourceManager, UpdateReceiver};
    pub use crate::provider::{ProvideRequest, ProviderBehaviourFlags, ResourceProvider};
    pub use crate::providers::{JsonDataProvider, TextDataProvider, TEXT_DATA_PROVIDER_ID};
    pub use crate::source::{ContentSource, FileSystemSource, MemorySource};
}
