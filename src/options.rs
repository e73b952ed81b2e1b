//! Typed configuration for the indexing and sorting pipeline, plus the
//! grammar constants shared by the parser, generator and verifier.

use std::path::PathBuf;

use crate::error::{Result, SortError};
use crate::index::record::RECORD_SIZE;

/// Delimiter between the number part and the string part of a row.
pub const PARTS_DELIMITER: &str = ". ";

/// Row terminator.
pub const ROW_ENDING: &str = "\n";

/// Characters that may never appear inside the number part.
pub const NUMBER_STOP_SYMBOLS: [char; 4] = ['\0', '\n', '.', ' '];

/// Characters that may never start the string part.
pub const STRING_STOP_SYMBOLS: [char; 3] = ['\0', '\n', '.'];

/// Symbols the number part may not start with (no leading zeros).
pub const NUMBER_FORBIDDEN_FIRST: &str = "0";

/// Symbols the string part may not start with.
pub const STRING_FORBIDDEN_FIRST: &str = " ";

/// Symbols the string part may not repeat back to back.
pub const STRING_FORBIDDEN_REPEAT: &str = " ";

/// Padding byte for cached prefixes shorter than the prefix width.
/// NUL sorts below every legal row byte.
pub const PREFIX_FILLER: u8 = 0;

/// Scratch buffer size for streamed span copies and span readers.
pub const STREAM_BUFFER_SIZE: usize = 4096;

/// Cache page geometry before budget scaling.
pub const DEFAULT_PAGE_SIZE: usize = 16384;
pub const MIN_PAGE_SIZE: usize = 1024;
pub const MIN_PAGES_COUNT: usize = 1;

/// Average row length above which parallel sorting pays for itself.
pub const PARALLEL_ROW_LENGTH_THRESHOLD: u64 = 1024;

/// Allowed deviation between requested and actual generated file size.
pub const FILE_SIZE_TOLERANCE_PERCENT: u64 = 5;

/// Text encodings the pipeline understands. The encoding *name* is part of
/// the configuration surface, but only UTF-8 (with or without a BOM) is
/// accepted; anything else fails eagerly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
}

impl Encoding {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            other => Err(SortError::Encoding(other.to_string())),
        }
    }

    /// Byte-order preamble for this encoding.
    pub fn preamble(self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => b"\xEF\xBB\xBF",
        }
    }
}

/// Options for one sort (or check) run over a source file.
#[derive(Debug, Clone)]
pub struct SorterOptions {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    /// Directory holding the transient index file.
    pub working_dir: PathBuf,
    pub encoding_name: String,
    pub cache_megabytes: u64,
    pub parallel: bool,
}

/// Options for building and addressing one file index.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub source_path: PathBuf,
    pub index_path: PathBuf,
    pub encoding: Encoding,
    pub cache_megabytes: u64,
    pub parallel: bool,
}

/// Options for the synthetic test-file generator.
#[derive(Debug, Clone)]
pub struct CreatorOptions {
    pub source_path: PathBuf,
    pub working_dir: PathBuf,
    pub encoding_name: String,
    pub with_bom: bool,
    pub size_bytes: u64,
    pub number_digits: String,
    pub number_length: u64,
    pub number_variation: u64,
    pub string_symbols: String,
    pub string_length: u64,
    pub string_variation: u64,
    /// Fixed seed for reproducible output; a time-derived seed when absent.
    pub seed: Option<u64>,
}

/// Memory layout derived from the cache budget.
///
/// The budget splits in two: half for the in-memory buffers of the small-
/// partition sort, half for page caches. The page-cache half splits again
/// between the mutable index cache and the read-only source cache. Under
/// parallel execution pages shrink and multiply so each worker keeps its own
/// window without growing the total.
#[derive(Debug, Clone, Copy)]
pub struct CacheLayout {
    pub page_size: usize,
    /// Page budget of the shared (index file) cache.
    pub pages_shared: usize,
    /// Page budget of each worker's source-cache shard.
    pub pages_per_worker: usize,
    /// Largest partition the sort may pull into memory, in records.
    pub buffer_limit: u64,
}

impl CacheLayout {
    pub fn new(cache_megabytes: u64, parallel: bool) -> Self {
        let workers = if parallel {
            rayon::current_num_threads().max(1) as u64
        } else {
            1
        };

        let total = cache_megabytes.max(1) * 1024 * 1024;
        let per_file = total / 4;

        let pages_each = (per_file / DEFAULT_PAGE_SIZE as u64).max(MIN_PAGES_COUNT as u64);
        let pages_shared = pages_each * workers;

        let mut page_size = DEFAULT_PAGE_SIZE as u64;
        if parallel {
            page_size = (page_size / workers).max(MIN_PAGE_SIZE as u64);
        }

        let buffer_limit = (total / 2 / RECORD_SIZE as u64 / workers).max(1);

        CacheLayout {
            page_size: page_size as usize,
            pages_shared: pages_shared as usize,
            pages_per_worker: pages_each as usize,
            buffer_limit,
        }
    }
}
