//! Disk layout and cached access for record stores.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::StoreCache;
use crate::codec;
use crate::error::{Error, Result};
use crate::record::DocStore;

/// File extension for store files.
pub const STORE_EXT: &str = "docs";

/// Replace characters that are unsafe in file names across platforms.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}

/// Path of the store file for `name` inside `dir`.
pub fn store_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{STORE_EXT}", sanitize_name(name)))
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(Error::NotFound(path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}

/// Serialize `store` to `<name>.docs` inside `dir`.
///
/// The directory must already exist; nothing is created implicitly.
pub fn write_store(store: &DocStore, dir: &Path) -> Result<()> {
    let path = store_path(dir, &store.name);
    let bytes = codec::encode_store(store)?;
    fs::write(&path, &bytes)?;
    tracing::debug!(store = %store.name, records = store.len(), bytes = bytes.len(), "wrote store");
    Ok(())
}

/// Read the store named `name` from `dir`.
pub fn read_store(name: &str, dir: &Path) -> Result<DocStore> {
    let bytes = read_file(&store_path(dir, name))?;
    let store = codec::decode_store(&bytes)?;
    tracing::debug!(store = %store.name, records = store.len(), bytes = bytes.len(), "read store");
    Ok(store)
}

/// Check for the store file without reading it.
pub fn store_exists(name: &str, dir: &Path) -> bool {
    store_path(dir, name).is_file()
}

/// Read every `*.docs` file in `dir`, in directory enumeration order.
pub fn list_stores(dir: &Path) -> Result<Vec<DocStore>> {
    let mut stores = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(STORE_EXT) {
            continue;
        }
        let bytes = read_file(&path)?;
        stores.push(codec::decode_store(&bytes)?);
    }
    Ok(stores)
}

/// Cached read: the loaded store when present, otherwise read from file and
/// populate `cache`.
pub fn read_store_cached(cache: &StoreCache, dir: &Path, name: &str) -> Result<Arc<DocStore>> {
    cache.get_or_load(dir, name, || read_store(name, dir))
}

/// Write-through with optional overwrite.
///
/// With `overwrite` false the call is a silent no-op when either the file or
/// a cache entry for the name already exists; a stale cache entry stays
/// untouched. A failed file write never reaches the cache; a successful one
/// always updates it.
pub fn write_store_cached(
    cache: &StoreCache,
    dir: &Path,
    store: DocStore,
    overwrite: bool,
) -> Result<()> {
    if !overwrite && (cache.contains(dir, &store.name) || store_exists(&store.name, dir)) {
        tracing::debug!(store = %store.name, "store already present, skipping write");
        return Ok(());
    }
    write_store(&store, dir)?;
    let name = store.name.clone();
    cache.insert(dir, &name, store);
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::record::Record;

    fn store(name: &str, text: &str) -> DocStore {
        DocStore::new(
            name,
            vec![Record::new()
                .with("text", text)
                .with("embedding", vec![1.0f32, 0.0])],
        )
    }

    #[test]
    fn writes_then_reads_back() {
        let dir = tempdir().unwrap();
        let original = store("a", "hello");
        write_store(&original, dir.path()).unwrap();
        assert!(store_exists("a", dir.path()));
        let back = read_store("a", dir.path()).unwrap();
        assert_eq!(original, back);
    }

    #[test]
    fn missing_store_is_not_found() {
        let dir = tempdir().unwrap();
        let err = read_store("ghost", dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!store_exists("ghost", dir.path()));
    }

    #[test]
    fn write_into_missing_directory_is_io() {
        let dir = tempdir().unwrap();
        let err = write_store(&store("a", "x"), &dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn sanitizes_hostile_names() {
        assert_eq!(sanitize_name(r#"a/b\c:d*e?f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
        let dir = tempdir().unwrap();
        let original = store("notes: 2024/draft", "x");
        write_store(&original, dir.path()).unwrap();
        assert!(dir.path().join("notes_ 2024_draft.docs").is_file());
        let back = read_store("notes: 2024/draft", dir.path()).unwrap();
        assert_eq!(original.name, back.name);
    }

    #[test]
    fn lists_only_store_files() {
        let dir = tempdir().unwrap();
        write_store(&store("a", "one"), dir.path()).unwrap();
        write_store(&store("b", "two"), dir.path()).unwrap();
        fs::write(dir.path().join("junk.txt"), b"not a store").unwrap();
        let mut names: Vec<String> = list_stores(dir.path())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        names.sort();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn cached_reader_hits_after_first_read() {
        let dir = tempdir().unwrap();
        write_store(&store("a", "hello"), dir.path()).unwrap();
        let cache = StoreCache::new();
        let first = read_store_cached(&cache, dir.path(), "a").unwrap();
        fs::remove_file(store_path(dir.path(), "a")).unwrap();
        let second = read_store_cached(&cache, dir.path(), "a").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn non_overwriting_writer_skips_when_only_the_file_exists() {
        let dir = tempdir().unwrap();
        write_store(&store("a", "first"), dir.path()).unwrap();
        let cache = StoreCache::new();
        write_store_cached(&cache, dir.path(), store("a", "second"), false).unwrap();
        assert!(cache.is_empty());
        assert_eq!(
            read_store("a", dir.path()).unwrap().records[0].text(),
            Some("first")
        );
    }

    #[test]
    fn write_through_populates_the_cache() {
        let dir = tempdir().unwrap();
        let cache = StoreCache::new();
        write_store_cached(&cache, dir.path(), store("a", "hello"), true).unwrap();
        assert!(cache.contains(dir.path(), "a"));
        fs::remove_file(store_path(dir.path(), "a")).unwrap();
        let cached = read_store_cached(&cache, dir.path(), "a").unwrap();
        assert_eq!(cached.records[0].text(), Some("hello"));
    }

    #[test]
    fn overwriting_writer_replaces_file_and_cache() {
        let dir = tempdir().unwrap();
        let cache = StoreCache::new();
        write_store_cached(&cache, dir.path(), store("a", "first"), false).unwrap();
        write_store_cached(&cache, dir.path(), store("a", "second"), true).unwrap();
        let cached = read_store_cached(&cache, dir.path(), "a").unwrap();
        assert_eq!(cached.records[0].text(), Some("second"));
        assert_eq!(
            read_store("a", dir.path()).unwrap().records[0].text(),
            Some("second")
        );
    }

    #[test]
    fn failed_write_leaves_cache_empty() {
        let dir = tempdir().unwrap();
        let cache = StoreCache::new();
        let missing = dir.path().join("nope");
        let err = write_store_cached(&cache, &missing, store("a", "x"), true).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(cache.is_empty());
    }
}
