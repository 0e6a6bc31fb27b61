//! Catalog errors

use thiserror::Error;
use void_resource::ResourceError;

/// Errors produced while reading, resolving or versioning catalogs
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog location does not carry exactly the expected hash dependencies
    #[error("catalog `{location}` has {found} hash dependencies, expected {expected}")]
    MalformedCatalogInput {
        location: String,
        found: usize,
        expected: usize,
    },

    /// Catalog payload is not valid JSON for the catalog model
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Reading or writing catalog content failed
    #[error("catalog io error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry references a key no entry provides
    #[error("entry `{entry}` depends on unknown key `{dependency}`")]
    UnknownDependency { entry: String, dependency: String },

    /// Entries depend on each other in a loop
    #[error("dependency cycle through `{0}`")]
    DependencyCycle(String),

    /// No catalog is registered under the id
    #[error("no catalog registered with id `{0}`")]
    UnknownCatalog(String),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<CatalogError> for ResourceError {
    fn from(err: CatalogError) -> Self {
        ResourceError::Failed(err.to_string())
    }
}
