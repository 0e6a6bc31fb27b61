//! Catalog versioning - choosing between the local, cached and remote catalog
//!
//! A versioned catalog location has exactly two dependencies: the remote hash
//! location and the cached hash location, in that order. The catalog data
//! files live next to the hash files with a `.json` extension.

use serde::{Deserialize, Serialize};
use void_resource::ResourceLocation;

use crate::error::{CatalogError, CatalogResult};

/// Number of hash dependencies a versioned catalog location carries
pub const HASH_DEPENDENCY_COUNT: usize = 2;
/// Index of the remote hash dependency
pub const REMOTE_HASH_INDEX: usize = 0;
/// Index of the cached hash dependency
pub const CACHE_HASH_INDEX: usize = 1;

/// Where a catalog is loaded from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogSource {
    /// Catalog shipped with the build
    Local,
    /// Catalog downloaded by an earlier run
    Cache,
    /// Catalog downloaded now
    Remote,
}

/// Outcome of the version check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSelection {
    pub source: CatalogSource,
    /// Internal id of the catalog data to load
    pub id_to_load: String,
    /// Hash to record as the catalog's local hash. `None` keeps the hash
    /// embedded in the loaded data.
    pub local_hash: Option<String>,
}

impl CatalogSelection {
    /// Select the build-embedded catalog of `location`
    pub fn local(location: &ResourceLocation) -> Self {
        Self {
            source: CatalogSource::Local,
            id_to_load: location.internal_id().to_string(),
            local_hash: None,
        }
    }
}

/// Check that `location` carries the hash dependencies versioning needs
pub fn check_hash_dependencies(location: &ResourceLocation) -> CatalogResult<()> {
    let found = location.dependencies().len();
    if found == HASH_DEPENDENCY_COUNT {
        Ok(())
    } else {
        Err(CatalogError::MalformedCatalogInput {
            location: location.primary_key().to_string(),
            found,
            expected: HASH_DEPENDENCY_COUNT,
        })
    }
}

/// Catalog data id for a hash file id: `catalog.hash` → `catalog.json`
pub fn data_id_for_hash(hash_id: &str) -> String {
    match hash_id.strip_suffix(".hash") {
        Some(stem) => format!("{stem}.json"),
        None => format!("{hash_id}.json"),
    }
}

/// Internal id of the cached catalog data, if the location is versioned
pub fn cache_data_id(location: &ResourceLocation) -> Option<String> {
    check_hash_dependencies(location).ok()?;
    Some(data_id_for_hash(
        location.dependencies()[CACHE_HASH_INDEX].internal_id(),
    ))
}

/// Decide which catalog to load.
///
/// `hashes` holds the fetched remote hash and the cached hash, in dependency
/// order; `None` or blank means unavailable. Malformed input selects the local
/// catalog.
///
/// With `force_local` and no cached hash the local catalog is selected under
/// the remote hash. That hash is only recorded on the loaded catalog; it is
/// not written to the cache hash file, since no cached catalog data matches it.
pub fn select_catalog(
    location: &ResourceLocation,
    hashes: &[Option<String>],
    force_local: bool,
) -> CatalogSelection {
    if let Err(err) = check_hash_dependencies(location) {
        log::debug!("{err}; using the local catalog");
        return CatalogSelection::local(location);
    }
    if hashes.len() != HASH_DEPENDENCY_COUNT {
        log::warn!(
            "catalog `{}` got {} hashes, expected {HASH_DEPENDENCY_COUNT}; using the local catalog",
            location.primary_key(),
            hashes.len()
        );
        return CatalogSelection::local(location);
    }

    let normalize = |hash: &Option<String>| {
        hash.as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
    };
    let remote = normalize(&hashes[REMOTE_HASH_INDEX]);
    let cached = normalize(&hashes[CACHE_HASH_INDEX]);

    let dependencies = location.dependencies();
    let cache = |hash: String| CatalogSelection {
        source: CatalogSource::Cache,
        id_to_load: data_id_for_hash(dependencies[CACHE_HASH_INDEX].internal_id()),
        local_hash: Some(hash),
    };

    let selection = match (force_local, remote, cached) {
        (true, remote, None) => CatalogSelection {
            local_hash: remote,
            ..CatalogSelection::local(location)
        },
        (true, _, Some(cached)) => cache(cached),
        (false, None, None) => CatalogSelection::local(location),
        (false, None, Some(cached)) => cache(cached),
        (false, Some(remote), Some(cached)) if remote == cached => cache(cached),
        (false, Some(remote), _) => CatalogSelection {
            source: CatalogSource::Remote,
            id_to_load: data_id_for_hash(dependencies[REMOTE_HASH_INDEX].internal_id()),
            local_hash: Some(remote),
        },
    };

    log::info!(
        "catalog `{}`: {:?} `{}`",
        location.primary_key(),
        selection.source,
        selection.id_to_load
    );
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn catalog(hash_deps: usize) -> ResourceLocation {
        let deps: Vec<Arc<ResourceLocation>> = [
            ("remote_hash", "https://cdn.example/catalog.hash"),
            ("cache_hash", "cache/catalog.hash"),
            ("extra", "extra.hash"),
        ]
        .iter()
        .take(hash_deps)
        .map(|(key, id)| ResourceLocation::new(*key, *id, "hash").shared())
        .collect();
        ResourceLocation::new("catalog", "catalog.json", "catalog").with_dependencies(deps)
    }

    fn hashes(remote: &str, cached: &str) -> Vec<Option<String>> {
        vec![Some(remote.to_string()), Some(cached.to_string())]
    }

    #[test]
    fn test_matching_hash_selects_cache() {
        let selection = select_catalog(&catalog(2), &hashes("hash", "hash"), false);
        assert_eq!(selection.source, CatalogSource::Cache);
        assert_eq!(selection.id_to_load, "cache/catalog.json");
    }

    #[test]
    fn test_new_hash_selects_remote() {
        let selection = select_catalog(&catalog(2), &hashes("newHash", "hash"), false);
        assert_eq!(selection.source, CatalogSource::Remote);
        assert_eq!(selection.id_to_load, "https://cdn.example/catalog.json");
        assert_eq!(selection.local_hash.as_deref(), Some("newHash"));
    }

    #[test]
    fn test_force_local_without_cache_records_remote_hash() {
        let selection = select_catalog(&catalog(2), &hashes("hash", ""), true);
        assert_eq!(selection.source, CatalogSource::Local);
        assert_eq!(selection.id_to_load, "catalog.json");
        assert_eq!(selection.local_hash.as_deref(), Some("hash"));
    }

    #[test]
    fn test_force_local_with_cache_selects_cache() {
        let selection = select_catalog(&catalog(2), &hashes("newHash", "hash"), true);
        assert_eq!(selection.source, CatalogSource::Cache);
        assert_eq!(selection.local_hash.as_deref(), Some("hash"));
    }

    #[test]
    fn test_offline_fallbacks() {
        let offline_cached = select_catalog(&catalog(2), &[None, Some("hash".into())], false);
        assert_eq!(offline_cached.source, CatalogSource::Cache);

        let offline_fresh = select_catalog(&catalog(2), &[None, None], false);
        assert_eq!(offline_fresh, CatalogSelection::local(&catalog(2)));
    }

    #[test]
    fn test_malformed_dependency_count_selects_local() {
        for count in [1, 3] {
            let location = catalog(count);
            assert!(matches!(
                check_hash_dependencies(&location),
                Err(CatalogError::MalformedCatalogInput { found, .. }) if found == count
            ));
            let selection = select_catalog(&location, &hashes("newHash", "hash"), false);
            assert_eq!(selection.source, CatalogSource::Local);
            assert_eq!(selection.id_to_load, "catalog.json");
        }
    }

    #[test]
    fn test_data_id_for_hash() {
        assert_eq!(data_id_for_hash("cache/main.hash"), "cache/main.json");
        assert_eq!(data_id_for_hash("cache/main"), "cache/main.json");
        assert_eq!(cache_data_id(&catalog(2)).as_deref(), Some("cache/catalog.json"));
        assert_eq!(cache_data_id(&catalog(1)), None);
    }
}
