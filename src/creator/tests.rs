use std::fs;

use tempfile::{TempDir, tempdir};

use super::*;

fn creator_options(dir: &TempDir, name: &str) -> CreatorOptions {
    CreatorOptions {
        source_path: dir.path().join(name),
        working_dir: dir.path().join("work"),
        encoding_name: "utf-8".into(),
        with_bom: false,
        size_bytes: 8192,
        number_digits: "0123456789".into(),
        number_length: 6,
        number_variation: 2,
        string_symbols: "abcdefg h".into(),
        string_length: 12,
        string_variation: 4,
        seed: Some(0x5EED),
    }
}

#[test]
fn generation_is_deterministic_for_a_fixed_seed() {
    let dir = tempdir().unwrap();
    let mut first = creator_options(&dir, "one.txt");
    let mut second = creator_options(&dir, "two.txt");
    first.seed = Some(42);
    second.seed = Some(42);

    let report_one = process(&first).unwrap();
    let report_two = process(&second).unwrap();

    assert_eq!(report_one.rows, report_two.rows);
    assert_eq!(
        fs::read(&first.source_path).unwrap(),
        fs::read(&second.source_path).unwrap()
    );
}

#[test]
fn generated_file_passes_verification() {
    let dir = tempdir().unwrap();
    let options = creator_options(&dir, "input.txt");
    let report = process(&options).unwrap();
    assert!(report.rows > 0);
    verify(&options).unwrap();
}

#[test]
fn generated_rows_match_the_grammar() {
    let dir = tempdir().unwrap();
    let options = creator_options(&dir, "input.txt");
    let report = process(&options).unwrap();

    let index_path = dir.path().join("grammar.index");
    let rows =
        crate::index::convert_text_to_index(&options.source_path, &index_path, Encoding::Utf8)
            .unwrap();
    assert_eq!(rows, report.rows);
}

#[test]
fn size_stays_within_tolerance() {
    let dir = tempdir().unwrap();
    let options = creator_options(&dir, "input.txt");
    let report = process(&options).unwrap();

    let actual = fs::metadata(&options.source_path).unwrap().len();
    assert_eq!(actual, report.bytes);
    let slack = options.size_bytes * FILE_SIZE_TOLERANCE_PERCENT / 100;
    assert!(actual >= options.size_bytes - slack);
    assert!(actual <= options.size_bytes + slack);
}

#[test]
fn bom_request_is_honored() {
    let dir = tempdir().unwrap();
    let mut options = creator_options(&dir, "input.txt");
    options.with_bom = true;
    process(&options).unwrap();

    let bytes = fs::read(&options.source_path).unwrap();
    assert_eq!(&bytes[..3], b"\xEF\xBB\xBF");
    verify(&options).unwrap();
}

#[test]
fn invalid_options_are_rejected() {
    let dir = tempdir().unwrap();
    let base = creator_options(&dir, "input.txt");

    let mut zero_size = base.clone();
    zero_size.size_bytes = 0;
    assert!(matches!(
        process(&zero_size),
        Err(SortError::InvalidOptions(_))
    ));

    let mut stop_symbol_digits = base.clone();
    stop_symbol_digits.number_digits = "12 3".into();
    assert!(matches!(
        process(&stop_symbol_digits),
        Err(SortError::InvalidOptions(_))
    ));

    let mut only_leading_zero = base.clone();
    only_leading_zero.number_digits = "0".into();
    assert!(matches!(
        process(&only_leading_zero),
        Err(SortError::InvalidOptions(_))
    ));

    let mut wide_variation = base.clone();
    wide_variation.string_variation = base.string_length;
    assert!(matches!(
        process(&wide_variation),
        Err(SortError::InvalidOptions(_))
    ));

    let mut stop_symbol_strings = base.clone();
    stop_symbol_strings.string_symbols = "ab.c".into();
    assert!(matches!(
        process(&stop_symbol_strings),
        Err(SortError::InvalidOptions(_))
    ));
}

#[test]
fn generated_file_sorts_cleanly() {
    let dir = tempdir().unwrap();
    let options = creator_options(&dir, "input.txt");
    let report = process(&options).unwrap();

    let sorter = sorter_options(&options, "output.txt");
    let sorted = crate::sorter::process(&sorter).unwrap();
    assert_eq!(sorted.rows, report.rows);
    crate::checker::process(&sorter).unwrap();
}
