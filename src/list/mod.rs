//! List abstraction over out-of-core storage, with sorting and searching
//! that never hold more than a bounded buffer of elements in memory.
//!
//! Element access is fallible because it goes through file caches; every
//! algorithm here propagates the first error it meets.

use std::cmp::Ordering;

use crate::error::{Result, SortError};

#[cfg(test)]
mod tests;

/// Random-access list whose elements live behind fallible storage.
pub trait LargeList<T> {
    fn get(&self, index: u64) -> Result<T>;
    fn set(&self, index: u64, value: T) -> Result<()>;
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest partition the sort may pull into memory at once.
    fn buffer_limit(&self) -> u64;
}

/// Fallible total order over list elements.
pub trait ListComparer<T> {
    fn compare(&self, left: &T, right: &T) -> Result<Ordering>;
}

fn check_range(len: u64, index: u64, count: u64) -> Result<()> {
    if index.checked_add(count).is_none_or(|end| end > len) {
        return Err(SortError::Bounds { index, count, len });
    }
    Ok(())
}

/// Returns the index of the first element smaller than its predecessor, or
/// `None` when the range is sorted.
pub fn is_sorted<T, L, C>(list: &L, comparer: &C, index: u64, count: u64) -> Result<Option<u64>>
where
    L: LargeList<T>,
    C: ListComparer<T>,
{
    check_range(list.len(), index, count)?;
    if count < 2 {
        return Ok(None);
    }
    let mut previous = list.get(index)?;
    for at in index + 1..index + count {
        let current = list.get(at)?;
        if comparer.compare(&previous, &current)? == Ordering::Greater {
            return Ok(Some(at));
        }
        previous = current;
    }
    Ok(None)
}

/// Binary search over a sorted range. Returns the index of *an* element
/// equal to `target`, not necessarily the first of a run.
pub fn binary_search<T, L, C>(
    list: &L,
    comparer: &C,
    target: &T,
    index: u64,
    count: u64,
) -> Result<Option<u64>>
where
    L: LargeList<T>,
    C: ListComparer<T>,
{
    check_range(list.len(), index, count)?;
    if count == 0 {
        return Err(SortError::Bounds {
            index,
            count,
            len: list.len(),
        });
    }
    let mut left = index;
    let mut right = index + count - 1;
    while left + 1 < right {
        let mid = left + (right - left) / 2;
        match comparer.compare(&list.get(mid)?, target)? {
            Ordering::Equal => return Ok(Some(mid)),
            Ordering::Less => left = mid,
            Ordering::Greater => right = mid,
        }
    }
    if comparer.compare(&list.get(left)?, target)? == Ordering::Equal {
        return Ok(Some(left));
    }
    if right != left && comparer.compare(&list.get(right)?, target)? == Ordering::Equal {
        return Ok(Some(right));
    }
    Ok(None)
}

pub fn swap<T, L: LargeList<T>>(list: &L, left: u64, right: u64) -> Result<()> {
    if left == right {
        return Ok(());
    }
    let a = list.get(left)?;
    let b = list.get(right)?;
    list.set(left, b)?;
    list.set(right, a)
}

/// In-place quicksort of `[index, index + count)`.
pub fn sort<T, L, C>(list: &L, comparer: &C, index: u64, count: u64) -> Result<()>
where
    T: Clone,
    L: LargeList<T>,
    C: ListComparer<T>,
{
    check_range(list.len(), index, count)?;
    if count == 0 {
        return Err(SortError::Bounds {
            index,
            count,
            len: list.len(),
        });
    }
    if count == 1 {
        return Ok(());
    }
    quicksort(list, comparer, index as i64, (index + count - 1) as i64)
}

/// Parallel variant: partitions fork into rayon tasks until the fork count
/// reaches `max_parallelism`, then each task finishes sequentially.
pub fn sort_parallel<T, L, C>(
    list: &L,
    comparer: &C,
    index: u64,
    count: u64,
    max_parallelism: u64,
) -> Result<()>
where
    T: Clone + Send,
    L: LargeList<T> + Sync,
    C: ListComparer<T> + Sync,
{
    check_range(list.len(), index, count)?;
    if count == 0 {
        return Err(SortError::Bounds {
            index,
            count,
            len: list.len(),
        });
    }
    if count == 1 {
        return Ok(());
    }
    quicksort_parallel(
        list,
        comparer,
        index as i64,
        (index + count - 1) as i64,
        0,
        max_parallelism,
    )
}

/// Hoare partition around the middle element's value. Borders are signed
/// because `j` may step below `left` on an already-partitioned range.
fn partition<T, L, C>(list: &L, comparer: &C, left: i64, right: i64) -> Result<i64>
where
    T: Clone,
    L: LargeList<T>,
    C: ListComparer<T>,
{
    let pivot = list.get(((left + right) / 2) as u64)?;
    let mut i = left - 1;
    let mut j = right + 1;
    loop {
        loop {
            i += 1;
            if comparer.compare(&list.get(i as u64)?, &pivot)? != Ordering::Less {
                break;
            }
        }
        loop {
            j -= 1;
            if comparer.compare(&list.get(j as u64)?, &pivot)? != Ordering::Greater {
                break;
            }
        }
        if i >= j {
            return Ok(j);
        }
        swap(list, i as u64, j as u64)?;
    }
}

fn quicksort<T, L, C>(list: &L, comparer: &C, left: i64, right: i64) -> Result<()>
where
    T: Clone,
    L: LargeList<T>,
    C: ListComparer<T>,
{
    if left >= right {
        return Ok(());
    }
    if (right - left + 1) as u64 <= list.buffer_limit() {
        return buffered_sort(list, comparer, left as u64, (right - left + 1) as u64);
    }
    let split = partition(list, comparer, left, right)?;
    quicksort(list, comparer, left, split)?;
    quicksort(list, comparer, split + 1, right)
}

fn quicksort_parallel<T, L, C>(
    list: &L,
    comparer: &C,
    left: i64,
    right: i64,
    degree: u32,
    max_parallelism: u64,
) -> Result<()>
where
    T: Clone + Send,
    L: LargeList<T> + Sync,
    C: ListComparer<T> + Sync,
{
    if left >= right {
        return Ok(());
    }
    if (right - left + 1) as u64 <= list.buffer_limit() {
        return buffered_sort(list, comparer, left as u64, (right - left + 1) as u64);
    }
    let split = partition(list, comparer, left, right)?;
    if degree >= 63 || (1u64 << degree) > max_parallelism {
        quicksort(list, comparer, left, split)?;
        return quicksort(list, comparer, split + 1, right);
    }
    let (first, second) = rayon::join(
        || quicksort_parallel(list, comparer, left, split, degree + 1, max_parallelism),
        || quicksort_parallel(list, comparer, split + 1, right, degree + 1, max_parallelism),
    );
    first?;
    second
}

/// Sorts a partition small enough to buffer entirely in memory.
fn buffered_sort<T, L, C>(list: &L, comparer: &C, index: u64, count: u64) -> Result<()>
where
    T: Clone,
    L: LargeList<T>,
    C: ListComparer<T>,
{
    let mut items = Vec::with_capacity(count as usize);
    for at in index..index + count {
        items.push(list.get(at)?);
    }

    // sort_by cannot early-return, so remember the first comparison error
    // and bail afterwards.
    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        match comparer.compare(a, b) {
            Ok(order) => order,
            Err(error) => {
                failure = Some(error);
                Ordering::Equal
            }
        }
    });
    if let Some(error) = failure {
        return Err(error);
    }

    for (offset, item) in items.into_iter().enumerate() {
        list.set(index + offset as u64, item)?;
    }
    Ok(())
}
