//! Content sources - byte storage behind the built-in providers
//!
//! Sources are shared across threads so a provider can read on a worker.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

/// Readable and writable byte storage addressed by internal id
pub trait ContentSource: Send + Sync {
    /// Read the whole entry
    fn read(&self, id: &str) -> io::Result<Vec<u8>>;

    /// Create or replace an entry
    fn write(&self, id: &str, data: &[u8]) -> io::Result<()>;

    /// Delete an entry
    fn remove(&self, id: &str) -> io::Result<()>;

    /// Check if an entry exists
    fn exists(&self, id: &str) -> bool;

    /// Read an entry as UTF-8 text
    fn read_string(&self, id: &str) -> io::Result<String> {
        let bytes = self.read(id)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// File system source. Ids are paths, optionally prefixed with `file://`,
/// resolved against an optional root.
#[derive(Clone, Debug, Default)]
pub struct FileSystemSource {
    root: Option<PathBuf>,
}

impl FileSystemSource {
    /// Source resolving ids as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Source resolving relative ids against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Resolve an id to a path
    pub fn resolve(&self, id: &str) -> PathBuf {
        let id = id.strip_prefix("file://").unwrap_or(id);
        let path = Path::new(id);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ContentSource for FileSystemSource {
    fn read(&self, id: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(id))
    }

    fn write(&self, id: &str, data: &[u8]) -> io::Result<()> {
        let path = self.resolve(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)
    }

    fn remove(&self, id: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(id))
    }

    fn exists(&self, id: &str) -> bool {
        self.resolve(id).is_file()
    }
}

/// In-memory source
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_entry(self, id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(id, data);
        self
    }

    /// Create or replace an entry
    pub fn insert(&self, id: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries.write().insert(id.into(), data.into());
    }

    /// Copy of an entry
    pub fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.entries.read().get(id).cloned()
    }

    /// Stored ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn not_found(id: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no entry `{id}`"))
}

impl ContentSource for MemorySource {
    fn read(&self, id: &str) -> io::Result<Vec<u8>> {
        self.get(id).ok_or_else(|| not_found(id))
    }

    fn write(&self, id: &str, data: &[u8]) -> io::Result<()> {
        self.insert(id, data);
        Ok(())
    }

    fn remove(&self, id: &str) -> io::Result<()> {
        self.entries
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    fn exists(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }
}
