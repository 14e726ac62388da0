//! Query scoring and result resolution.

use std::path::Path;
use std::time::Instant;

use ndarray::ArrayView1;

use crate::cache::StoreCache;
use crate::error::{Error, Result};
use crate::index::DenseIndex;
use crate::record::DocStore;
use crate::store::read_store_cached;

/// Positions of the `min(k, n)` highest-scoring rows, best first.
///
/// Scores are the dot products of `query` against every row, computed as a
/// single matrix-vector product over the whole index; rows are assumed
/// unit-normalized by their producer, which makes the score a cosine
/// surrogate. Ties go to the lower row index, so the ranking is fully
/// deterministic. `k == 0` yields an empty result and any `k >= n` yields
/// all `n` positions sorted by descending score.
pub fn top_k(index: &DenseIndex, query: &[f32], k: usize) -> Result<Vec<usize>> {
    if query.len() != index.dim() {
        return Err(Error::DimensionMismatch {
            expected: index.dim(),
            got: query.len(),
        });
    }
    let n = index.len();
    if k == 0 || n == 0 {
        return Ok(Vec::new());
    }
    let started = Instant::now();
    let scores = index.vectors.dot(&ArrayView1::from(query));
    let rank = |a: &usize, b: &usize| scores[*b].total_cmp(&scores[*a]).then_with(|| a.cmp(b));
    let mut positions: Vec<usize> = (0..n).collect();
    let k = k.min(n);
    if k < n {
        positions.select_nth_unstable_by(k - 1, rank);
        positions.truncate(k);
    }
    positions.sort_unstable_by(rank);
    tracing::debug!(index = %index.name, rows = n, k, elapsed = ?started.elapsed(), "scored query");
    Ok(positions)
}

/// Materialize the window `[start, end)` of an ordered position list into a
/// store-shaped result named `{index}_{start}_{len}`.
///
/// Positions must come from [`top_k`] over the same index. The window is
/// clamped to the available positions. Referenced stores load through
/// `cache` from `dir`; a reference whose record index no longer fits the
/// store it names fails with `StaleReference`.
pub fn resolve(
    index: &DenseIndex,
    positions: &[usize],
    cache: &StoreCache,
    dir: &Path,
    start: usize,
    end: usize,
) -> Result<DocStore> {
    let name = format!("{}_{}_{}", index.name, start, end.saturating_sub(start));
    let lo = start.min(positions.len());
    let hi = end.clamp(lo, positions.len());
    let mut records = Vec::with_capacity(hi - lo);
    for &position in &positions[lo..hi] {
        let record_ref = &index.refs[position];
        let store = read_store_cached(cache, dir, &record_ref.store)?;
        let record = store
            .records
            .get(record_ref.record)
            .cloned()
            .ok_or_else(|| Error::StaleReference {
                store: record_ref.store.clone(),
                index: record_ref.record,
                len: store.records.len(),
            })?;
        records.push(record);
    }
    Ok(DocStore::new(name, records))
}
