use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SortError>;

/// Errors produced by the indexing, caching and sorting layers.
///
/// Format and short-read failures are kept distinct: the former means the
/// source text does not match the row grammar, the latter means the index
/// file itself is truncated or corrupt.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("{path}: malformed row at byte {position}")]
    Format { path: PathBuf, position: u64 },

    #[error("{path}: source file is empty")]
    EmptySource { path: PathBuf },

    #[error("{path}: file not found")]
    MissingSource { path: PathBuf },

    #[error("unsupported encoding '{0}' (only utf-8 is supported)")]
    Encoding(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("{path}: index file truncated at offset {offset}")]
    ShortRead { path: PathBuf, offset: u64 },

    #[error("range [{index}, {index}+{count}) is out of bounds for a list of {len}")]
    Bounds { index: u64, count: u64, len: u64 },

    #[error("row count changed during processing: {expected} before, {actual} after")]
    RowCountMismatch { expected: u64, actual: u64 },

    #[error("verification failed: {0}")]
    CheckFailed(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
