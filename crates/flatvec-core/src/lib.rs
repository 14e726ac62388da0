//! Brute-force semantic search over flat files.
//!
//! Three small pieces: named record stores holding free-form records plus
//! embeddings, a dense index stacking those embeddings into one N×D matrix
//! with back-references to the source records, and a search routine that
//! scores a query against every row in a single matrix-vector product and
//! resolves the best rows back into records. There is no approximate
//! structure anywhere; exhaustive scoring is the point.
//!
//! Stores and indices live one file per name inside a caller-chosen
//! directory, and both can be read through explicit caches so repeated
//! resolution never touches the disk twice for the same name.

pub mod cache;
mod codec;
pub mod error;
pub mod index;
pub mod record;
pub mod search;
pub mod store;

pub use cache::{FileCache, IndexCache, StoreCache};
pub use codec::FORMAT_VERSION;
pub use error::{Error, Result};
pub use index::{
    build_index, embedding_of, index_exists, index_path, read_index, read_index_cached,
    write_index, write_index_cached, DenseIndex, RecordRef, INDEX_EXT,
};
pub use record::{DocStore, Record, Value};
pub use search::{resolve, top_k};
pub use store::{
    list_stores, read_store, read_store_cached, sanitize_name, store_exists, store_path,
    write_store, write_store_cached, STORE_EXT,
};
