//! Verification of a finished sort run against the original source file.
//!
//! Five checks, each printed as it passes: preamble equivalence, row
//! counts, target order, every source row findable in the target, and
//! matching occurrence counts for equal-row runs.

use crate::error::{Result, SortError};
use crate::index::{self, FileIndex, RecordComparer};
use crate::list::{self, LargeList, ListComparer};
use crate::options::{IndexOptions, SorterOptions};


/// Checks that `options.target_path` is a sorted permutation of
/// `options.source_path`. Fresh indexes over both files are built in the
/// working directory and removed afterwards.
pub fn process(options: &SorterOptions) -> Result<()> {
    let encoding = crate::sorter::validate(options)?;

    if index::has_preamble(&options.source_path, encoding)?
        != index::has_preamble(&options.target_path, encoding)?
    {
        return Err(SortError::CheckFailed(
            "target preamble does not match source preamble".into(),
        ));
    }
    println!("Encoding BOM is OK.");

    let target = FileIndex::open(
        IndexOptions {
            source_path: options.target_path.clone(),
            index_path: index::unique_index_path(&options.working_dir),
            encoding,
            cache_megabytes: options.cache_megabytes,
            parallel: options.parallel,
        },
        true,
        true,
    )?;
    let source = FileIndex::open(
        IndexOptions {
            source_path: options.source_path.clone(),
            index_path: index::unique_index_path(&options.working_dir),
            encoding,
            cache_megabytes: options.cache_megabytes,
            parallel: options.parallel,
        },
        true,
        true,
    )?;

    if source.len() != target.len() {
        return Err(SortError::CheckFailed(format!(
            "source has {} rows but target has {}",
            source.len(),
            target.len()
        )));
    }
    println!("Rows count is OK.");

    let target_order = RecordComparer::new(&target);
    if let Some(violation) = list::is_sorted(&target, &target_order, 0, target.len())? {
        return Err(SortError::CheckFailed(format!(
            "target is not sorted at row {}",
            violation + 1
        )));
    }
    println!("Rows order is OK.");

    check_availability(&source, &target)?;
    println!("Rows availability is OK.");

    check_occurrences(options, &source, &target)?;
    println!("Rows occurrences is OK.");

    source.close()?;
    target.close()?;
    Ok(())
}

/// Every source row must be findable in the sorted target.
fn check_availability(source: &FileIndex, target: &FileIndex) -> Result<()> {
    let comparer = RecordComparer::between(target, source);
    for at in 0..source.len() {
        let row = source.get(at)?;
        let found = list::binary_search(target, &comparer, &row, 0, target.len())?;
        if found.is_none() {
            return Err(SortError::CheckFailed(format!(
                "target does not contain source row {}",
                at + 1
            )));
        }
    }
    Ok(())
}

/// Sorts the source index too, then walks equal-row runs of both indexes
/// in lockstep comparing run lengths.
fn check_occurrences(
    options: &SorterOptions,
    source: &FileIndex,
    target: &FileIndex,
) -> Result<()> {
    let source_order = RecordComparer::new(source);
    if options.parallel {
        let workers = rayon::current_num_threads() as u64;
        list::sort_parallel(source, &source_order, 0, source.len(), workers)?;
    } else {
        list::sort(source, &source_order, 0, source.len())?;
    }

    let target_order = RecordComparer::new(target);
    let crosswise = RecordComparer::between(source, target);

    let mut source_at = 0u64;
    let mut target_at = 0u64;
    while source_at < source.len() && target_at < target.len() {
        let source_row = source.get(source_at)?;
        let mut source_end = source_at + 1;
        while source_end < source.len() {
            let next = source.get(source_end)?;
            if source_order.compare(&source_row, &next)? != std::cmp::Ordering::Equal {
                break;
            }
            source_end += 1;
        }

        let target_row = target.get(target_at)?;
        let mut target_end = target_at + 1;
        while target_end < target.len() {
            let next = target.get(target_end)?;
            if target_order.compare(&target_row, &next)? != std::cmp::Ordering::Equal {
                break;
            }
            target_end += 1;
        }

        if crosswise.compare(&source_row, &target_row)? != std::cmp::Ordering::Equal {
            return Err(SortError::CheckFailed(format!(
                "target row {} is not present in source",
                target_at + 1
            )));
        }
        if source_end - source_at != target_end - target_at {
            return Err(SortError::CheckFailed(format!(
                "target row {} occurs {} times but source has it {} times",
                target_at + 1,
                target_end - target_at,
                source_end - source_at
            )));
        }

        source_at = source_end;
        target_at = target_end;
    }
    Ok(())
}
