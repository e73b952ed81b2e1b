use std::fs;
use std::path::PathBuf;

use tempfile::{TempDir, tempdir};

use super::*;
use crate::error::SortError;
use crate::list::{self, LargeList, ListComparer};
use crate::options::{Encoding, IndexOptions};

fn index_options(dir: &TempDir, source_name: &str, text: &[u8]) -> IndexOptions {
    let source_path = dir.path().join(source_name);
    fs::write(&source_path, text).unwrap();
    IndexOptions {
        index_path: source_path.with_extension("index"),
        source_path,
        encoding: Encoding::Utf8,
        cache_megabytes: 1,
        parallel: false,
    }
}

/// Indexes `text`, sorts the index, and returns the emitted rows.
fn sort_rows(text: &[u8]) -> Vec<u8> {
    let dir = tempdir().unwrap();
    let options = index_options(&dir, "input.txt", text);
    let target_path = dir.path().join("output.txt");

    let index = FileIndex::open(options.clone(), true, false).unwrap();
    let comparer = RecordComparer::new(&index);
    list::sort(&index, &comparer, 0, index.len()).unwrap();
    index.close().unwrap();

    convert_index_to_text(
        &options.source_path,
        &options.index_path,
        &target_path,
        Encoding::Utf8,
        false,
    )
    .unwrap();
    fs::read(&target_path).unwrap()
}

#[test]
fn record_codec_roundtrip() {
    let mut prefix = [0u8; CACHED_PREFIX_LEN];
    prefix[..5].copy_from_slice(b"hello");
    let record = IndexRecord {
        number_start: -42,
        number_end: 0,
        string_start: 1 << 40,
        string_end: (1 << 40) + 5,
        prefix,
    };
    let encoded = record.encode();
    assert_eq!(encoded.len(), RECORD_SIZE);
    assert_eq!(IndexRecord::decode(&encoded), record);
}

#[test]
fn indexes_inline_and_span_rows() {
    let dir = tempdir().unwrap();
    let options = index_options(&dir, "input.txt", b"7. abc\n123456789012345678901. xy\n");

    let rows = convert_text_to_index(&options.source_path, &options.index_path, Encoding::Utf8)
        .unwrap();
    assert_eq!(rows, 2);

    let index = FileIndex::open(options, false, true).unwrap();
    assert_eq!(index.len(), 2);

    let first = index.get(0).unwrap();
    assert!(first.number_is_inline());
    assert_eq!(first.number_start, 7);
    assert_eq!(first.string_start, 3);
    assert_eq!(first.string_end, 6);
    assert_eq!(&first.prefix[..3], b"abc");
    assert!(first.prefix[3..].iter().all(|&b| b == 0));

    // 21 digits overflow i64, so the number stays a span.
    let second = index.get(1).unwrap();
    assert!(!second.number_is_inline());
    assert_eq!(second.number_start, 7);
    assert_eq!(second.number_end, 28);
    assert_eq!(second.string_start, 30);
    assert_eq!(second.string_end, 32);
    assert_eq!(&second.prefix[..2], b"xy");
}

#[test]
fn non_digit_number_part_falls_back_to_span() {
    let dir = tempdir().unwrap();
    let options = index_options(&dir, "input.txt", b"12a4. x\n");
    convert_text_to_index(&options.source_path, &options.index_path, Encoding::Utf8).unwrap();

    let index = FileIndex::open(options, false, true).unwrap();
    let record = index.get(0).unwrap();
    assert!(!record.number_is_inline());
    assert_eq!(record.number_start, 0);
    assert_eq!(record.number_end, 4);
}

#[test]
fn preamble_shifts_spans_and_survives_roundtrip() {
    let dir = tempdir().unwrap();
    let mut text = b"\xEF\xBB\xBF".to_vec();
    text.extend_from_slice(b"5. first\n3. second\n");
    let options = index_options(&dir, "input.txt", &text);

    assert!(has_preamble(&options.source_path, Encoding::Utf8).unwrap());
    convert_text_to_index(&options.source_path, &options.index_path, Encoding::Utf8).unwrap();

    let index = FileIndex::open(options.clone(), false, false).unwrap();
    let first = index.get(0).unwrap();
    assert_eq!(first.number_start, 5);
    assert_eq!(first.string_start, 6);
    assert_eq!(first.string_end, 11);
    drop(index);

    let target_path = dir.path().join("output.txt");
    convert_index_to_text(
        &options.source_path,
        &options.index_path,
        &target_path,
        Encoding::Utf8,
        false,
    )
    .unwrap();
    assert_eq!(fs::read(&target_path).unwrap(), text);
}

#[test]
fn roundtrip_preserves_bytes() {
    let dir = tempdir().unwrap();
    let long_tail = "z".repeat(100);
    let text = format!(
        "1. short\n98765432109876543210987. with a longer string part {long_tail}\n42. юникод строка\n7. exactly sixteen!\n"
    );
    let options = index_options(&dir, "input.txt", text.as_bytes());

    let rows = convert_text_to_index(&options.source_path, &options.index_path, Encoding::Utf8)
        .unwrap();
    assert_eq!(rows, 4);

    let target_path = dir.path().join("output.txt");
    let emitted = convert_index_to_text(
        &options.source_path,
        &options.index_path,
        &target_path,
        Encoding::Utf8,
        false,
    )
    .unwrap();
    assert_eq!(emitted, 4);
    assert_eq!(fs::read(&target_path).unwrap(), text.as_bytes());
}

#[test]
fn empty_source_is_rejected() {
    let dir = tempdir().unwrap();
    for text in [&b""[..], b"\xEF\xBB\xBF"] {
        let options = index_options(&dir, "input.txt", text);
        let result =
            convert_text_to_index(&options.source_path, &options.index_path, Encoding::Utf8);
        assert!(matches!(result, Err(SortError::EmptySource { .. })));
    }
}

#[test]
fn malformed_rows_are_format_errors() {
    let dir = tempdir().unwrap();
    let broken: [&[u8]; 5] = [
        b"1. x",       // no row ending
        b". x\n",      // row starts with a stop symbol
        b"1.x\n",      // delimiter missing its space
        b"1. .abc\n",  // string part starts with a stop symbol
        b"1 2. x\n",   // space inside the number part
    ];
    for (at, text) in broken.iter().enumerate() {
        let options = index_options(&dir, &format!("input{at}.txt"), text);
        let result =
            convert_text_to_index(&options.source_path, &options.index_path, Encoding::Utf8);
        assert!(
            matches!(result, Err(SortError::Format { .. })),
            "case {at} should be a format error"
        );
    }
}

#[test]
fn sorts_by_string_part_then_number_part() {
    let sorted = sort_rows(b"5. b\n10. a\n99999999999999999999. a\n9. a\n");
    assert_eq!(
        sorted,
        b"9. a\n10. a\n99999999999999999999. a\n5. b\n".as_slice()
    );
}

#[test]
fn equal_rows_keep_multiset() {
    let sorted = sort_rows(b"1. same\n1. same\n1. same\n");
    assert_eq!(sorted, b"1. same\n1. same\n1. same\n".as_slice());
}

#[test]
fn long_string_ties_break_past_the_prefix() {
    // Both strings share the full 16-byte prefix and differ at byte 17.
    let sorted = sort_rows(b"1. AAAAAAAAAAAAAAAAB\n1. AAAAAAAAAAAAAAAAA\n");
    assert_eq!(
        sorted,
        b"1. AAAAAAAAAAAAAAAAA\n1. AAAAAAAAAAAAAAAAB\n".as_slice()
    );
}

#[test]
fn prefix_length_string_sorts_before_longer_extension() {
    let sorted = sort_rows(b"1. AAAAAAAAAAAAAAAAx\n1. AAAAAAAAAAAAAAAA\n");
    assert_eq!(
        sorted,
        b"1. AAAAAAAAAAAAAAAA\n1. AAAAAAAAAAAAAAAAx\n".as_slice()
    );
}

#[test]
fn numbers_order_by_length_before_digits() {
    let sorted = sort_rows(
        b"99999999999999999990999. a\n99999999999999999990111. a\n9999999999999999999. a\n",
    );
    assert_eq!(
        sorted,
        b"9999999999999999999. a\n99999999999999999990111. a\n99999999999999999990999. a\n"
            .as_slice()
    );
}

#[test]
fn comparer_bridges_two_indexes() {
    let dir = tempdir().unwrap();
    let left_options = index_options(&dir, "left.txt", b"1. apple\n2. banana\n");
    let right_options = index_options(&dir, "right.txt", b"2. banana\n1. apple\n");

    let left = FileIndex::open(left_options, true, true).unwrap();
    let right = FileIndex::open(right_options, true, true).unwrap();
    let comparer = RecordComparer::between(&left, &right);

    let apple = left.get(0).unwrap();
    let banana_right = right.get(0).unwrap();
    let apple_right = right.get(1).unwrap();

    assert_eq!(
        comparer.compare(&apple, &apple_right).unwrap(),
        std::cmp::Ordering::Equal
    );
    assert_eq!(
        comparer.compare(&apple, &banana_right).unwrap(),
        std::cmp::Ordering::Less
    );
}

#[test]
fn truncated_index_is_a_short_read() {
    let dir = tempdir().unwrap();
    let options = index_options(&dir, "input.txt", b"1. one\n2. two\n");
    convert_text_to_index(&options.source_path, &options.index_path, Encoding::Utf8).unwrap();

    let full = fs::read(&options.index_path).unwrap();
    fs::write(&options.index_path, &full[..full.len() - 10]).unwrap();

    let target_path: PathBuf = dir.path().join("output.txt");
    let result = convert_index_to_text(
        &options.source_path,
        &options.index_path,
        &target_path,
        Encoding::Utf8,
        false,
    );
    assert!(matches!(result, Err(SortError::ShortRead { .. })));
}

#[test]
fn cleanup_removes_index_file_on_close() {
    let dir = tempdir().unwrap();
    let options = index_options(&dir, "input.txt", b"1. x\n");
    let index_path = options.index_path.clone();

    let index = FileIndex::open(options, true, true).unwrap();
    assert!(index_path.is_file());
    index.close().unwrap();
    assert!(!index_path.exists());
}
