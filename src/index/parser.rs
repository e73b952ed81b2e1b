//! Conversion between the source text file and its binary index, in both
//! directions.
//!
//! Rows follow the grammar `<number>". "<string>"\n"`. Parsing is a small
//! state machine over decoded characters; byte positions advance by each
//! character's UTF-8 width so the recorded spans address raw file bytes.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::{Result, SortError};
use crate::index::record::{CACHED_PREFIX_LEN, IndexRecord, RECORD_SIZE};
use crate::options::{
    Encoding, NUMBER_STOP_SYMBOLS, PARTS_DELIMITER, PREFIX_FILLER, ROW_ENDING,
    STREAM_BUFFER_SIZE, STRING_STOP_SYMBOLS,
};

/// Streaming character reader that tracks byte positions in the underlying
/// file.
struct RowScanner<R> {
    reader: R,
    path: PathBuf,
    /// Byte offset of the next unread character.
    position: u64,
    /// Byte offset where the most recently read character starts.
    char_position: u64,
}

impl<R: BufRead> RowScanner<R> {
    fn next_char(&mut self) -> Result<Option<char>> {
        let mut first = [0u8; 1];
        let read = self.reader.read(&mut first)?;
        if read == 0 {
            return Ok(None);
        }
        let width = match first[0] {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(self.invalid_at(self.position)),
        };
        let mut raw = [0u8; 4];
        raw[0] = first[0];
        if width > 1 {
            self.reader
                .read_exact(&mut raw[1..width])
                .map_err(|_| self.invalid_at(self.position))?;
        }
        let decoded = std::str::from_utf8(&raw[..width])
            .map_err(|_| self.invalid_at(self.position))?
            .chars()
            .next()
            .ok_or_else(|| self.invalid_at(self.position))?;
        self.char_position = self.position;
        self.position += width as u64;
        Ok(Some(decoded))
    }

    /// Fast path for long string parts: scans forward to the row ending
    /// without per-character decoding, validating the skipped bytes as
    /// UTF-8. Returns the byte position of the row ending (consumed), or
    /// `None` at end-of-file.
    fn scan_line_end(&mut self) -> Result<Option<u64>> {
        loop {
            let buffer = self.reader.fill_buf()?;
            if buffer.is_empty() {
                return Ok(None);
            }
            match memchr::memchr(b'\n', buffer) {
                Some(at) => {
                    if std::str::from_utf8(&buffer[..at]).is_err() {
                        return Err(self.invalid_at(self.position));
                    }
                    self.reader.consume(at + 1);
                    let ending = self.position + at as u64;
                    self.char_position = ending;
                    self.position = ending + 1;
                    return Ok(Some(ending));
                }
                None => {
                    let available = buffer.len();
                    let valid = match std::str::from_utf8(buffer) {
                        Ok(_) => available,
                        Err(error) if error.error_len().is_none() => error.valid_up_to(),
                        Err(error) => {
                            return Err(
                                self.invalid_at(self.position + error.valid_up_to() as u64)
                            );
                        }
                    };
                    self.reader.consume(valid);
                    self.position += valid as u64;
                    if valid < available {
                        // A character split across the buffer boundary;
                        // decode it the slow way and keep scanning.
                        if self.next_char()?.is_none() {
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    fn format_error(&self) -> SortError {
        SortError::Format {
            path: self.path.clone(),
            position: self.char_position,
        }
    }

    fn invalid_at(&self, position: u64) -> SortError {
        SortError::Format {
            path: self.path.clone(),
            position,
        }
    }
}

/// Parses the next row into a record, or `None` at a clean end-of-file.
///
/// End-of-file anywhere inside a row is a format error. A number part whose
/// digits overflow `i64`, or which contains characters other than ASCII
/// digits, falls back to the span encoding; only the stop symbols reject
/// the row outright.
fn read_row<R: BufRead>(scanner: &mut RowScanner<R>) -> Result<Option<IndexRecord>> {
    let row_start = scanner.position;
    let Some(first) = scanner.next_char()? else {
        return Ok(None);
    };
    if NUMBER_STOP_SYMBOLS.contains(&first) {
        return Err(scanner.format_error());
    }
    let mut inline = first.to_digit(10).map(i64::from);

    // Number part: ends at the first delimiter character.
    let number_end;
    loop {
        let at = scanner.position;
        let Some(symbol) = scanner.next_char()? else {
            return Err(scanner.format_error());
        };
        if symbol == '.' {
            number_end = at;
            break;
        }
        if NUMBER_STOP_SYMBOLS.contains(&symbol) {
            return Err(scanner.format_error());
        }
        inline = match (inline, symbol.to_digit(10)) {
            (Some(acc), Some(digit)) if (i64::MAX - i64::from(digit)) / 10 >= acc => {
                Some(acc * 10 + i64::from(digit))
            }
            _ => None,
        };
    }

    match scanner.next_char()? {
        Some(' ') => {}
        _ => return Err(scanner.format_error()),
    }

    // The first string character may not be a stop symbol; later ones may.
    let string_start = scanner.position;
    let Some(head) = scanner.next_char()? else {
        return Err(scanner.format_error());
    };
    if STRING_STOP_SYMBOLS.contains(&head) {
        return Err(scanner.format_error());
    }
    let mut prefix = [PREFIX_FILLER; CACHED_PREFIX_LEN];
    let mut prefix_len = push_prefix(&mut prefix, 0, head);

    let string_end;
    loop {
        if prefix_len == CACHED_PREFIX_LEN {
            match scanner.scan_line_end()? {
                Some(ending) => {
                    string_end = ending;
                    break;
                }
                None => return Err(scanner.format_error()),
            }
        }
        let at = scanner.position;
        let Some(symbol) = scanner.next_char()? else {
            return Err(scanner.format_error());
        };
        if symbol == '\n' {
            string_end = at;
            break;
        }
        prefix_len = push_prefix(&mut prefix, prefix_len, symbol);
    }

    let record = match inline {
        Some(value) => IndexRecord {
            number_start: value,
            number_end: 0,
            string_start: string_start as i64,
            string_end: string_end as i64,
            prefix,
        },
        None => IndexRecord {
            number_start: row_start as i64,
            number_end: number_end as i64,
            string_start: string_start as i64,
            string_end: string_end as i64,
            prefix,
        },
    };
    Ok(Some(record))
}

/// Appends `symbol`'s UTF-8 bytes to the prefix, cutting at the prefix
/// width. Returns the new filled length.
fn push_prefix(prefix: &mut [u8; CACHED_PREFIX_LEN], filled: usize, symbol: char) -> usize {
    let mut raw = [0u8; 4];
    let bytes = symbol.encode_utf8(&mut raw).as_bytes();
    let count = bytes.len().min(CACHED_PREFIX_LEN - filled);
    prefix[filled..filled + count].copy_from_slice(&bytes[..count]);
    filled + count
}

/// True when the file starts with the encoding's byte-order preamble.
pub fn has_preamble(path: &Path, encoding: Encoding) -> Result<bool> {
    let expected = encoding.preamble();
    let mut actual = vec![0u8; expected.len()];
    let file = File::open(path)?;
    let mut filled = 0usize;
    while filled < actual.len() {
        let read = file.read_at(&mut actual[filled..], filled as u64)?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled == expected.len() && actual == expected)
}

/// Builds the index file for `source_path`, returning the row count.
pub fn convert_text_to_index(
    source_path: &Path,
    index_path: &Path,
    encoding: Encoding,
) -> Result<u64> {
    let source = File::open(source_path)?;
    let mut reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, source);

    let preamble = encoding.preamble();
    let skip = {
        let buffer = reader.fill_buf()?;
        if buffer.len() >= preamble.len() && &buffer[..preamble.len()] == preamble {
            preamble.len()
        } else {
            0
        }
    };
    reader.consume(skip);

    let mut scanner = RowScanner {
        reader,
        path: source_path.to_path_buf(),
        position: skip as u64,
        char_position: skip as u64,
    };

    let index = File::create(index_path)?;
    let mut writer = BufWriter::with_capacity(STREAM_BUFFER_SIZE, index);

    let mut rows = 0u64;
    while let Some(record) = read_row(&mut scanner)? {
        writer.write_all(&record.encode())?;
        rows += 1;
    }
    writer.flush()?;

    if rows == 0 {
        return Err(SortError::EmptySource {
            path: source_path.to_path_buf(),
        });
    }
    Ok(rows)
}

/// Emits the rows named by the index file in index order, returning the row
/// count. With `append` the target grows instead of being truncated and no
/// preamble is written.
pub fn convert_index_to_text(
    source_path: &Path,
    index_path: &Path,
    target_path: &Path,
    encoding: Encoding,
    append: bool,
) -> Result<u64> {
    let index = File::open(index_path)?;
    let mut index_reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, index);
    let source = File::open(source_path)?;

    let target = if append {
        OpenOptions::new().append(true).create(true).open(target_path)?
    } else {
        File::create(target_path)?
    };
    let mut writer = BufWriter::with_capacity(STREAM_BUFFER_SIZE, target);

    if !append && has_preamble(source_path, encoding)? {
        writer.write_all(encoding.preamble())?;
    }

    let mut rows = 0u64;
    let mut buffer = [0u8; RECORD_SIZE];
    loop {
        let mut filled = 0usize;
        while filled < RECORD_SIZE {
            let read = index_reader.read(&mut buffer[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            break;
        }
        if filled < RECORD_SIZE {
            return Err(SortError::ShortRead {
                path: index_path.to_path_buf(),
                offset: rows * RECORD_SIZE as u64 + filled as u64,
            });
        }

        let record = IndexRecord::decode(&buffer);
        write_row(&record, &mut writer, &source, source_path)?;
        rows += 1;
    }

    writer.flush()?;
    Ok(rows)
}

fn write_row<W: Write>(
    record: &IndexRecord,
    writer: &mut W,
    source: &File,
    source_path: &Path,
) -> Result<()> {
    if record.number_is_inline() {
        let mut digits = itoa::Buffer::new();
        writer.write_all(digits.format(record.number_start).as_bytes())?;
    } else {
        copy_span(
            writer,
            source,
            source_path,
            record.number_start as u64,
            record.number_end as u64,
        )?;
    }

    writer.write_all(PARTS_DELIMITER.as_bytes())?;

    let string_len = record.string_span_len();
    if string_len <= CACHED_PREFIX_LEN as u64 {
        writer.write_all(&record.prefix[..string_len as usize])?;
    } else {
        copy_span(
            writer,
            source,
            source_path,
            record.string_start as u64,
            record.string_end as u64,
        )?;
    }

    writer.write_all(ROW_ENDING.as_bytes())?;
    Ok(())
}

/// Copies source bytes `[start, end)` through a fixed scratch buffer.
fn copy_span<W: Write>(
    writer: &mut W,
    source: &File,
    source_path: &Path,
    start: u64,
    end: u64,
) -> Result<()> {
    let mut scratch = [0u8; STREAM_BUFFER_SIZE];
    let mut at = start;
    while at < end {
        let wanted = ((end - at) as usize).min(scratch.len());
        let read = source.read_at(&mut scratch[..wanted], at)?;
        if read == 0 {
            return Err(SortError::ShortRead {
                path: source_path.to_path_buf(),
                offset: at,
            });
        }
        writer.write_all(&scratch[..read])?;
        at += read as u64;
    }
    Ok(())
}
