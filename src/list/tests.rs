use std::cmp::Ordering;
use std::sync::Mutex;

use proptest::prelude::*;

use super::*;

/// In-memory list with interior mutability, standing in for the file-backed
/// index in algorithm tests.
struct MemList {
    items: Mutex<Vec<i64>>,
    buffer_limit: u64,
}

impl MemList {
    fn new(items: Vec<i64>, buffer_limit: u64) -> Self {
        MemList {
            items: Mutex::new(items),
            buffer_limit,
        }
    }

    fn snapshot(&self) -> Vec<i64> {
        self.items.lock().unwrap().clone()
    }
}

impl LargeList<i64> for MemList {
    fn get(&self, index: u64) -> Result<i64> {
        Ok(self.items.lock().unwrap()[index as usize])
    }

    fn set(&self, index: u64, value: i64) -> Result<()> {
        self.items.lock().unwrap()[index as usize] = value;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.items.lock().unwrap().len() as u64
    }

    fn buffer_limit(&self) -> u64 {
        self.buffer_limit
    }
}

struct NumOrder;

impl ListComparer<i64> for NumOrder {
    fn compare(&self, left: &i64, right: &i64) -> Result<Ordering> {
        Ok(left.cmp(right))
    }
}

#[test]
fn sort_orders_reverse_input() {
    let list = MemList::new((0..100).rev().collect(), 8);
    sort(&list, &NumOrder, 0, 100).unwrap();
    assert_eq!(list.snapshot(), (0..100).collect::<Vec<_>>());
}

#[test]
fn sort_with_tiny_buffer_still_orders() {
    let list = MemList::new(vec![5, 1, 4, 1, 5, 9, 2, 6, 5, 3], 1);
    sort(&list, &NumOrder, 0, 10).unwrap();
    assert_eq!(list.snapshot(), vec![1, 1, 2, 3, 4, 5, 5, 5, 6, 9]);
}

#[test]
fn sort_respects_subrange() {
    let list = MemList::new(vec![9, 3, 2, 1, 9], 2);
    sort(&list, &NumOrder, 1, 3).unwrap();
    assert_eq!(list.snapshot(), vec![9, 1, 2, 3, 9]);
}

#[test]
fn sort_out_of_range_is_error() {
    let list = MemList::new(vec![1, 2, 3], 8);
    assert!(matches!(
        sort(&list, &NumOrder, 1, 3),
        Err(SortError::Bounds { .. })
    ));
    assert!(matches!(
        sort(&list, &NumOrder, u64::MAX, 2),
        Err(SortError::Bounds { .. })
    ));
}

#[test]
fn zero_count_sort_and_search_are_errors() {
    let list = MemList::new(vec![1, 2, 3], 8);
    assert!(matches!(
        sort(&list, &NumOrder, 0, 0),
        Err(SortError::Bounds { .. })
    ));
    assert!(matches!(
        sort_parallel(&list, &NumOrder, 0, 0, 4),
        Err(SortError::Bounds { .. })
    ));
    assert!(matches!(
        binary_search(&list, &NumOrder, &2, 1, 0),
        Err(SortError::Bounds { .. })
    ));
}

#[test]
fn parallel_sort_matches_sequential() {
    let mut values: Vec<i64> = (0..5000).map(|i| (i * 2654435761u64 % 10007) as i64).collect();
    let list = MemList::new(values.clone(), 64);
    sort_parallel(&list, &NumOrder, 0, values.len() as u64, 8).unwrap();
    values.sort();
    assert_eq!(list.snapshot(), values);
}

#[test]
fn parallel_sort_with_zero_parallelism_runs_sequentially() {
    let list = MemList::new((0..50).rev().collect(), 4);
    sort_parallel(&list, &NumOrder, 0, 50, 0).unwrap();
    assert_eq!(list.snapshot(), (0..50).collect::<Vec<_>>());
}

#[test]
fn is_sorted_reports_first_violation() {
    let list = MemList::new(vec![1, 2, 5, 4, 6], 8);
    assert_eq!(is_sorted(&list, &NumOrder, 0, 5).unwrap(), Some(3));

    let list = MemList::new(vec![1, 1, 2, 3], 8);
    assert_eq!(is_sorted(&list, &NumOrder, 0, 4).unwrap(), None);

    let list = MemList::new(Vec::new(), 8);
    assert_eq!(is_sorted(&list, &NumOrder, 0, 0).unwrap(), None);
}

#[test]
fn binary_search_finds_present_and_rejects_absent() {
    let list = MemList::new(vec![2, 4, 6, 8, 10, 12], 8);
    for (target, expected) in [(2, true), (8, true), (12, true), (5, false), (13, false)] {
        let hit = binary_search(&list, &NumOrder, &target, 0, 6).unwrap();
        assert_eq!(hit.is_some(), expected, "target {target}");
        if let Some(at) = hit {
            assert_eq!(list.get(at).unwrap(), target);
        }
    }
}

#[test]
fn binary_search_on_single_element_range() {
    let list = MemList::new(vec![7], 8);
    assert_eq!(binary_search(&list, &NumOrder, &7, 0, 1).unwrap(), Some(0));
    assert_eq!(binary_search(&list, &NumOrder, &8, 0, 1).unwrap(), None);
}

proptest! {
    #[test]
    fn sort_produces_sorted_permutation(
        mut values in prop::collection::vec(-1000i64..1000, 1..200),
        buffer_limit in 1u64..32,
    ) {
        let list = MemList::new(values.clone(), buffer_limit);
        sort(&list, &NumOrder, 0, values.len() as u64).unwrap();
        values.sort();
        prop_assert_eq!(list.snapshot(), values);
    }

    #[test]
    fn binary_search_agrees_with_linear_scan(
        mut values in prop::collection::vec(0i64..50, 1..60),
        target in 0i64..50,
    ) {
        values.sort();
        let list = MemList::new(values.clone(), 8);
        let hit = binary_search(&list, &NumOrder, &target, 0, values.len() as u64).unwrap();
        prop_assert_eq!(hit.is_some(), values.contains(&target));
    }
}
