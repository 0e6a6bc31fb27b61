//! # void_catalog - Versioned Content Catalogs
//!
//! Key based lookup on top of `void_resource`:
//! - Catalog data model with key resolved dependency graphs
//! - Local, cached and remote catalog selection by content hash
//! - Update checks and in-place catalog swaps
//! - Cache cleanup of archives no catalog references
//!
//! ## Example
//!
//! ```ignore
//! use void_catalog::prelude::*;
//!
//! let source: Arc<dyn ContentSource> = Arc::new(FileSystemSource::with_root("content"));
//! let settings = RuntimeSettings::load(source.as_ref(), "settings.json")?;
//!
//! let mut rm = ResourceManager::new(settings.manager.clone());
//! let catalogs = ContentCatalogs::new();
//!
//! let init = catalogs.initialize(&mut rm, &settings, source);
//! rm.wait_for_completion(init)?;
//! rm.release(init)?;
//!
//! let logo: Handle<String> = catalogs.load_resource(&mut rm, "ui/logo");
//!
//! // Later: look for newer content
//! let check = catalogs.check_for_updates(&mut rm);
//! ```

pub mod catalogs;
pub mod data;
pub mod error;
pub mod info;
pub mod locator;
pub mod provider;
pub mod settings;
pub mod versioning;

pub use catalogs::{ArchiveCache, ContentCatalogs, UpdateOptions};
pub use data::{CatalogEntry, ContentCatalogData, ProviderDescriptor};
pub use error::{CatalogError, CatalogResult};
pub use info::CatalogLocatorInfo;
pub use locator::{ResourceLocationMap, ResourceLocator};
pub use provider::{ContentCatalogProvider, CATALOG_HASH_PROVIDER_ID, CONTENT_CATALOG_PROVIDER_ID};
pub use settings::{CatalogSettings, RuntimeSettings};
pub use versioning::{
    cache_data_id, check_hash_dependencies, data_id_for_hash, select_catalog, CatalogSelection,
    CatalogSource,
};

/// Prelude - commonly used types
pub mod prelude {
    pub use void_resource::prelude::*;

    pub use crate::catalogs::{ArchiveCache, ContentCatalogs, UpdateOptions};
    pub use crate::data::{CatalogEntry, ContentCatalogData};
    pub use crate::error::{CatalogError, CatalogResult};
    pub use crate::locator::ResourceLocator;
    pub use crate::settings::{CatalogSettings, RuntimeSettings};
}
