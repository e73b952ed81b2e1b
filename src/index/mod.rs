//! Binary index over the source text file: record layout, text/index
//! conversion, the file-backed record list and the record ordering.

mod compare;
mod file_index;
mod parser;
pub mod record;

pub use compare::RecordComparer;
pub use file_index::FileIndex;
pub use parser::{convert_index_to_text, convert_text_to_index, has_preamble};
pub use record::{CACHED_PREFIX_LEN, IndexRecord, RECORD_SIZE};

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Transient index file name, unique per process and instant.
pub(crate) fn unique_index_path(working_dir: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0);
    working_dir.join(format!("index_{}_{nanos:x}.bin", std::process::id()))
}

#[cfg(test)]
mod tests;
