//! Dense index construction and its disk form.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::cache::IndexCache;
use crate::codec;
use crate::error::{Error, Result};
use crate::record::{DocStore, Record};
use crate::store::{read_file, sanitize_name};

/// File extension for index files.
pub const INDEX_EXT: &str = "flatidx";

/// Pointer to one record in one store: the store's name plus the record's
/// position at index-build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub store: String,
    pub record: usize,
}

/// An N×D matrix of embeddings plus the parallel reference table mapping each
/// row back to its source record.
///
/// Row order is canonical: stores in the order given at build time, records
/// in store order within each. Everything downstream ("position") means a row
/// index under this ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseIndex {
    pub name: String,
    pub vectors: Array2<f32>,
    pub refs: Vec<RecordRef>,
}

impl DenseIndex {
    /// Number of rows (indexed records).
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimensionality.
    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }
}

/// Extract every record's vector and stack them into one matrix.
///
/// Fails with `DimensionMismatch` the moment `extract` yields a vector whose
/// length differs from the first one seen. Zero input records produce an
/// empty 0x0 index.
pub fn build_index<F>(name: &str, stores: &[DocStore], mut extract: F) -> Result<DenseIndex>
where
    F: FnMut(&Record) -> Result<Vec<f32>>,
{
    let mut dim: Option<usize> = None;
    let mut flat: Vec<f32> = Vec::new();
    let mut refs: Vec<RecordRef> = Vec::new();
    for store in stores {
        for (position, record) in store.records.iter().enumerate() {
            let vector = extract(record)?;
            match dim {
                None => dim = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(Error::DimensionMismatch {
                        expected,
                        got: vector.len(),
                    });
                }
                Some(_) => {}
            }
            flat.extend_from_slice(&vector);
            refs.push(RecordRef {
                store: store.name.clone(),
                record: position,
            });
        }
    }
    let dim = dim.unwrap_or(0);
    let vectors = matrix_from_parts(refs.len(), dim, flat)?;
    tracing::debug!(index = name, rows = refs.len(), dim, "built dense index");
    Ok(DenseIndex {
        name: name.to_string(),
        vectors,
        refs,
    })
}

/// The conventional extractor: a record's reserved `embedding` field.
pub fn embedding_of(record: &Record) -> Result<Vec<f32>> {
    record
        .embedding()
        .map(<[f32]>::to_vec)
        .ok_or(Error::MissingField("embedding"))
}

pub(crate) fn matrix_from_parts(rows: usize, dim: usize, data: Vec<f32>) -> Result<Array2<f32>> {
    Array2::from_shape_vec((rows, dim), data)
        .map_err(|err| Error::Format(format!("vector block does not fit {rows}x{dim}: {err}")))
}

/// Path of the index file for `name` inside `dir`.
pub fn index_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{INDEX_EXT}", sanitize_name(name)))
}

/// Serialize `index` to `<name>.flatidx` inside `dir`.
///
/// The directory must already exist; nothing is created implicitly.
pub fn write_index(index: &DenseIndex, dir: &Path) -> Result<()> {
    let path = index_path(dir, &index.name);
    let bytes = codec::encode_index(index)?;
    fs::write(&path, &bytes)?;
    tracing::debug!(index = %index.name, rows = index.len(), bytes = bytes.len(), "wrote index");
    Ok(())
}

/// Read the index named `name` from `dir`.
pub fn read_index(name: &str, dir: &Path) -> Result<DenseIndex> {
    let bytes = read_file(&index_path(dir, name))?;
    let index = codec::decode_index(&bytes)?;
    tracing::debug!(index = %index.name, rows = index.len(), bytes = bytes.len(), "read index");
    Ok(index)
}

/// Check for the index file without reading it.
pub fn index_exists(name: &str, dir: &Path) -> bool {
    index_path(dir, name).is_file()
}

/// Cached read: the loaded index when present, otherwise read from file and
/// populate `cache`.
pub fn read_index_cached(cache: &IndexCache, dir: &Path, name: &str) -> Result<Arc<DenseIndex>> {
    cache.get_or_load(dir, name, || read_index(name, dir))
}

/// Write-through with optional overwrite; same contract as
/// [`crate::store::write_store_cached`].
pub fn write_index_cached(
    cache: &IndexCache,
    dir: &Path,
    index: DenseIndex,
    overwrite: bool,
) -> Result<()> {
    if !overwrite && (cache.contains(dir, &index.name) || index_exists(&index.name, dir)) {
        tracing::debug!(index = %index.name, "index already present, skipping write");
        return Ok(());
    }
    write_index(&index, dir)?;
    let name = index.name.clone();
    cache.insert(dir, &name, index);
    Ok(())
}
