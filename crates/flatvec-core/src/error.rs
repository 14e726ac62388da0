use std::path::PathBuf;

use thiserror::Error;

/// Errors that can surface while reading, writing, building, or searching.
#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("malformed file: {0}")]
    Format(String),
    #[error("unsupported format version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("record {index} out of range for store '{store}' ({len} records)")]
    StaleReference {
        store: String,
        index: usize,
        len: usize,
    },
    #[error("record is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
