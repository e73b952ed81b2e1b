//! Synthetic source-file generator, plus verification of a generated file.
//!
//! The file fills in two halves. The first half draws every row from a
//! fresh seed, one seed per row. The second half draws its seeds from the
//! pool the first half already used, so the file is guaranteed to contain
//! rows whose string parts repeat; sorting such a file is only interesting
//! when ties exist.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SortError};
use crate::index::{self, FileIndex, RecordComparer};
use crate::list::{self, LargeList};
use crate::options::{
    CreatorOptions, Encoding, FILE_SIZE_TOLERANCE_PERCENT, IndexOptions, NUMBER_FORBIDDEN_FIRST,
    NUMBER_STOP_SYMBOLS, PARTS_DELIMITER, ROW_ENDING, STRING_FORBIDDEN_FIRST,
    STRING_FORBIDDEN_REPEAT, STRING_STOP_SYMBOLS, SorterOptions,
};

#[cfg(test)]
mod tests;

/// Outcome of a completed generation run.
#[derive(Debug, Clone, Copy)]
pub struct CreatorReport {
    pub rows: u64,
    pub bytes: u64,
}

/// xorshift64 PRNG; each row regenerates from its own seed so equal seeds
/// yield equal parts.
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        state ^= state >> 30;
        state = state.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        state ^= state >> 27;
        if state == 0 {
            state = 0x1234_5678_9abc_def0;
        }
        Rng { state }
    }

    fn from_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0);
        Rng::new(nanos ^ u64::from(std::process::id()))
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Random index in `[0, n)` with rejection sampling to avoid modulo
    /// bias.
    fn gen_range(&mut self, n: u64) -> u64 {
        if n <= 1 {
            return 0;
        }
        let zone = u64::MAX - u64::MAX % n;
        loop {
            let value = self.next_u64();
            if value < zone {
                return value % n;
            }
        }
    }

    /// Length offset in `[-variation, variation]`.
    fn variation(&mut self, variation: u64) -> i64 {
        self.gen_range(2 * variation + 1) as i64 - variation as i64
    }
}

/// Byte-counting writer; part loops stop once the byte budget is crossed.
struct RowWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> RowWriter<W> {
    fn push_str(&mut self, text: &str) -> Result<()> {
        self.inner.write_all(text.as_bytes())?;
        self.written += text.len() as u64;
        Ok(())
    }

    fn push_char(&mut self, symbol: char) -> Result<()> {
        let mut raw = [0u8; 4];
        self.push_str(symbol.encode_utf8(&mut raw))
    }
}

/// Generates `options.source_path`, returning row and byte totals.
pub fn process(options: &CreatorOptions) -> Result<CreatorReport> {
    validate(options)?;

    let start_seed = match options.seed {
        Some(seed) => seed,
        None => Rng::from_clock().next_u64(),
    };

    let file = File::create(&options.source_path)?;
    let mut writer = RowWriter {
        inner: BufWriter::new(file),
        written: 0,
    };
    if options.with_bom {
        let preamble = Encoding::parse(&options.encoding_name)?.preamble();
        writer.inner.write_all(preamble)?;
        writer.written += preamble.len() as u64;
    }

    let digits: Vec<char> = options.number_digits.chars().collect();
    let symbols: Vec<char> = options.string_symbols.chars().collect();

    // First half: one fresh seed per row.
    let mut rows = 0u64;
    let half = options.size_bytes / 2;
    while writer.written < half {
        let seed = start_seed.wrapping_add(rows);
        write_number_part(&mut writer, &mut Rng::new(seed), options, &digits, half)?;
        writer.push_str(PARTS_DELIMITER)?;
        write_string_part(&mut writer, &mut Rng::new(seed), options, &symbols, half)?;
        writer.push_str(ROW_ENDING)?;
        rows += 1;
    }
    let seeded_rows = rows;

    // Second half: both parts reuse seeds drawn from the first half's
    // pool, independently, so string parts repeat across rows.
    let mut picker = match options.seed {
        Some(seed) => Rng::new(seed ^ 0x6A09_E667_F3BC_C909),
        None => Rng::from_clock(),
    };
    let budget = options.size_bytes;
    while writer.written < budget {
        let number_seed = start_seed.wrapping_add(picker.gen_range(seeded_rows));
        write_number_part(&mut writer, &mut Rng::new(number_seed), options, &digits, budget)?;
        writer.push_str(PARTS_DELIMITER)?;
        let string_seed = start_seed.wrapping_add(picker.gen_range(seeded_rows));
        write_string_part(&mut writer, &mut Rng::new(string_seed), options, &symbols, budget)?;
        writer.push_str(ROW_ENDING)?;
        rows += 1;
    }

    writer.inner.flush()?;
    Ok(CreatorReport {
        rows,
        bytes: writer.written,
    })
}

/// Checks a generated file: size within tolerance, preamble presence, row
/// grammar, and at least one repeated string part.
pub fn verify(options: &CreatorOptions) -> Result<()> {
    validate(options)?;
    let encoding = Encoding::parse(&options.encoding_name)?;

    let actual = std::fs::metadata(&options.source_path)?.len();
    let min = options.size_bytes * (100 - FILE_SIZE_TOLERANCE_PERCENT) / 100;
    let max = options.size_bytes * (100 + FILE_SIZE_TOLERANCE_PERCENT) / 100;
    if actual < min || actual > max {
        return Err(SortError::CheckFailed(format!(
            "generated file is {actual} bytes, outside [{min}, {max}]"
        )));
    }
    println!("File size is OK.");

    if index::has_preamble(&options.source_path, encoding)? != options.with_bom {
        return Err(SortError::CheckFailed(
            "preamble presence does not match the requested output".into(),
        ));
    }
    println!("Encoding BOM is OK.");

    // Building an index over the file exercises the full row grammar.
    let grammar_index = index::unique_index_path(&options.working_dir);
    let built = index::convert_text_to_index(&options.source_path, &grammar_index, encoding);
    let _ = std::fs::remove_file(&grammar_index);
    built?;
    println!("Rows pattern is OK.");

    let sort_index = FileIndex::open(
        IndexOptions {
            source_path: options.source_path.clone(),
            index_path: index::unique_index_path(&options.working_dir),
            encoding,
            cache_megabytes: 16,
            parallel: false,
        },
        true,
        true,
    )?;
    let comparer = RecordComparer::new(&sort_index);
    list::sort(&sort_index, &comparer, 0, sort_index.len())?;

    let mut duplicated = false;
    for at in 1..sort_index.len() {
        let previous = sort_index.get(at - 1)?;
        let current = sort_index.get(at)?;
        if comparer.compare_string_parts(&previous, &current)? == std::cmp::Ordering::Equal {
            duplicated = true;
            break;
        }
    }
    sort_index.close()?;
    if !duplicated {
        return Err(SortError::CheckFailed(
            "no rows with a repeating string part".into(),
        ));
    }
    println!("Strings duplication is OK.");
    Ok(())
}

/// Sorter options pointing at a generated file, for pipeline callers.
pub fn sorter_options(options: &CreatorOptions, target_name: &str) -> SorterOptions {
    SorterOptions {
        source_path: options.source_path.clone(),
        target_path: options.source_path.with_file_name(target_name),
        working_dir: options.working_dir.clone(),
        encoding_name: options.encoding_name.clone(),
        cache_megabytes: 16,
        parallel: false,
    }
}

fn validate(options: &CreatorOptions) -> Result<()> {
    if !options.working_dir.is_dir() {
        std::fs::create_dir_all(&options.working_dir)?;
    }
    Encoding::parse(&options.encoding_name)?;
    if options.size_bytes < 1 {
        return Err(SortError::InvalidOptions(
            "target size must be at least one byte".into(),
        ));
    }

    let digits: Vec<char> = options.number_digits.chars().collect();
    if digits.is_empty() || digits.iter().any(|d| NUMBER_STOP_SYMBOLS.contains(d)) {
        return Err(SortError::InvalidOptions(
            "number digits must be non-empty and free of stop symbols".into(),
        ));
    }
    if digits.iter().all(|d| NUMBER_FORBIDDEN_FIRST.contains(*d)) {
        return Err(SortError::InvalidOptions(
            "number digits must contain a symbol usable as a leading digit".into(),
        ));
    }
    if options.number_length < 1 || options.number_variation >= options.number_length {
        return Err(SortError::InvalidOptions(
            "number length must be positive and exceed its variation".into(),
        ));
    }

    let symbols: Vec<char> = options.string_symbols.chars().collect();
    if symbols.is_empty() || symbols.iter().any(|s| STRING_STOP_SYMBOLS.contains(s)) {
        return Err(SortError::InvalidOptions(
            "string symbols must be non-empty and free of stop symbols".into(),
        ));
    }
    if symbols.iter().all(|s| STRING_FORBIDDEN_FIRST.contains(*s)) {
        return Err(SortError::InvalidOptions(
            "string symbols must contain a symbol usable at the start".into(),
        ));
    }
    if options.string_length < 1 || options.string_variation >= options.string_length {
        return Err(SortError::InvalidOptions(
            "string length must be positive and exceed its variation".into(),
        ));
    }
    Ok(())
}

fn write_number_part<W: Write>(
    writer: &mut RowWriter<W>,
    rng: &mut Rng,
    options: &CreatorOptions,
    digits: &[char],
    budget: u64,
) -> Result<()> {
    let length = (options.number_length as i64 + rng.variation(options.number_variation)).max(1);
    let mut count = 0i64;
    let mut first = true;
    while count < length {
        let digit = digits[rng.gen_range(digits.len() as u64) as usize];
        if first && NUMBER_FORBIDDEN_FIRST.contains(digit) {
            continue;
        }
        writer.push_char(digit)?;
        if writer.written > budget {
            break;
        }
        first = false;
        count += 1;
    }
    Ok(())
}

fn write_string_part<W: Write>(
    writer: &mut RowWriter<W>,
    rng: &mut Rng,
    options: &CreatorOptions,
    symbols: &[char],
    budget: u64,
) -> Result<()> {
    let length = (options.string_length as i64 + rng.variation(options.string_variation)).max(1);
    let mut count = 0i64;
    let mut first = true;
    let mut previous = '\0';
    while count < length {
        let symbol = symbols[rng.gen_range(symbols.len() as u64) as usize];
        if STRING_FORBIDDEN_REPEAT.contains(symbol) && previous == symbol {
            continue;
        }
        if first && STRING_FORBIDDEN_FIRST.contains(symbol) {
            continue;
        }
        let emitted = if first {
            symbol.to_uppercase().next().unwrap_or(symbol)
        } else {
            symbol
        };
        writer.push_char(emitted)?;
        if writer.written > budget {
            break;
        }
        previous = symbol;
        first = false;
        count += 1;
    }
    Ok(())
}
