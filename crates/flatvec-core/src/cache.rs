//! Explicit lookup-or-populate caches over loaded stores and indices.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::index::DenseIndex;
use crate::record::DocStore;

/// In-memory cache keyed by `(directory, name)`.
///
/// Entries are added on first successful read or on write-through and are
/// never evicted or invalidated automatically; `clear` is the only way to
/// drop them. A single mutex guards the whole lookup-or-populate sequence,
/// so a value is loaded at most once per key even under concurrent readers.
pub struct FileCache<T> {
    entries: Mutex<HashMap<(PathBuf, String), Arc<T>>>,
}

/// Cache over record stores.
pub type StoreCache = FileCache<DocStore>;

/// Cache over dense indices.
pub type IndexCache = FileCache<DenseIndex>;

impl<T> FileCache<T> {
    pub fn new() -> Self {
        FileCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value for `(dir, name)`, or run `load` and keep its result.
    ///
    /// A failed load is returned as-is and leaves the cache untouched.
    pub fn get_or_load<F>(&self, dir: &Path, name: &str, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let key = (dir.to_path_buf(), name.to_string());
        let mut entries = self.entries.lock();
        if let Some(hit) = entries.get(&key) {
            return Ok(Arc::clone(hit));
        }
        let value = Arc::new(load()?);
        entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Store `value` under `(dir, name)`, replacing any previous entry.
    pub fn insert(&self, dir: &Path, name: &str, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.entries
            .lock()
            .insert((dir.to_path_buf(), name.to_string()), Arc::clone(&value));
        value
    }

    pub fn contains(&self, dir: &Path, name: &str) -> bool {
        self.entries
            .lock()
            .contains_key(&(dir.to_path_buf(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<T> Default for FileCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
