//! The sort pipeline: index the source, order the index, emit the target.

use std::fs::File;
use std::path::PathBuf;

use crate::error::{Result, SortError};
use crate::index::{self, FileIndex, RecordComparer};
use crate::list::{self, LargeList};
use crate::options::{Encoding, IndexOptions, PARALLEL_ROW_LENGTH_THRESHOLD, SorterOptions};


/// Outcome of a completed sort run.
#[derive(Debug, Clone, Copy)]
pub struct SortReport {
    pub rows: u64,
    pub parallel: bool,
}

/// Sorts `options.source_path` into `options.target_path`.
///
/// The source is never modified; all reordering happens in a transient
/// index file under the working directory, which is removed when the run
/// finishes either way.
pub fn process(options: &SorterOptions) -> Result<SortReport> {
    let encoding = validate(options)?;
    let index_path = index::unique_index_path(&options.working_dir);

    let report = generate_sorted_file(options, encoding, &index_path);
    if report.is_err() {
        let _ = std::fs::remove_file(&index_path);
    }
    report
}

pub(crate) fn validate(options: &SorterOptions) -> Result<Encoding> {
    if !options.source_path.is_file() {
        return Err(SortError::MissingSource {
            path: options.source_path.clone(),
        });
    }
    let encoding = Encoding::parse(&options.encoding_name)?;
    if !options.working_dir.is_dir() {
        std::fs::create_dir_all(&options.working_dir)?;
    }
    if !options.target_path.exists() {
        File::create(&options.target_path)?;
    }
    if options.cache_megabytes < 1 {
        return Err(SortError::InvalidOptions(
            "cache size must be at least one megabyte".into(),
        ));
    }
    Ok(encoding)
}

fn generate_sorted_file(
    options: &SorterOptions,
    encoding: Encoding,
    index_path: &PathBuf,
) -> Result<SortReport> {
    let rows = index::convert_text_to_index(&options.source_path, index_path, encoding)?;

    // Fork/join sorting only pays off when rows are long enough that the
    // comparer spends its time in span I/O rather than cached prefixes.
    let source_length = std::fs::metadata(&options.source_path)?.len();
    let average_row_length = source_length / rows;
    let parallel = options.parallel && average_row_length > PARALLEL_ROW_LENGTH_THRESHOLD;

    let index = FileIndex::open(
        IndexOptions {
            source_path: options.source_path.clone(),
            index_path: index_path.clone(),
            encoding,
            cache_megabytes: options.cache_megabytes,
            parallel,
        },
        false,
        false,
    )?;

    let comparer = RecordComparer::new(&index);
    if parallel {
        let workers = rayon::current_num_threads() as u64;
        list::sort_parallel(&index, &comparer, 0, index.len(), workers)?;
    } else {
        list::sort(&index, &comparer, 0, index.len())?;
    }
    index.close()?;

    let emitted = index::convert_index_to_text(
        &options.source_path,
        index_path,
        &options.target_path,
        encoding,
        false,
    )?;
    std::fs::remove_file(index_path)?;

    if emitted != rows {
        return Err(SortError::RowCountMismatch {
            expected: rows,
            actual: emitted,
        });
    }
    Ok(SortReport { rows, parallel })
}
