//! Total order over index records: string part first, number part second.
//!
//! The comparer tries hard not to touch the source file. Most decisions
//! fall out of the cached prefixes and the span metadata alone; only ties
//! that survive those stream the spans byte by byte.

use std::cmp::Ordering;
use std::os::unix::fs::FileExt;

use crate::cache::{HandleGuard, ShardedReadCache};
use crate::error::{Result, SortError};
use crate::index::file_index::FileIndex;
use crate::index::record::{CACHED_PREFIX_LEN, IndexRecord};
use crate::list::ListComparer;
use crate::options::STREAM_BUFFER_SIZE;

/// Compares records of one index, or of two indexes over different files.
pub struct RecordComparer<'a> {
    left: &'a FileIndex,
    right: &'a FileIndex,
}

impl<'a> RecordComparer<'a> {
    /// Comparer for records of a single index.
    pub fn new(index: &'a FileIndex) -> Self {
        RecordComparer {
            left: index,
            right: index,
        }
    }

    /// Comparer whose first argument comes from `left` and second from
    /// `right`; used to search one index for rows of another.
    pub fn between(left: &'a FileIndex, right: &'a FileIndex) -> Self {
        RecordComparer { left, right }
    }

    /// Same index instance and same span means the same underlying bytes.
    fn same_instance(&self) -> bool {
        std::ptr::eq(self.left, self.right)
    }

    pub fn compare_string_parts(&self, x: &IndexRecord, y: &IndexRecord) -> Result<Ordering> {
        let by_prefix = x.prefix.cmp(&y.prefix);
        if by_prefix != Ordering::Equal {
            return Ok(by_prefix);
        }

        if self.same_instance()
            && x.string_start == y.string_start
            && x.string_end == y.string_end
        {
            return Ok(Ordering::Equal);
        }

        let x_len = x.string_span_len();
        let y_len = y.string_span_len();
        let cached = CACHED_PREFIX_LEN as u64;

        // Equal prefixes decide everything for spans the prefix covers.
        if x_len <= cached && y_len <= cached {
            return Ok(Ordering::Equal);
        }
        if x_len == cached && y_len > cached {
            return Ok(Ordering::Less);
        }
        if y_len == cached && x_len > cached {
            return Ok(Ordering::Greater);
        }

        let mut first = SpanReader::open(
            self.left.source_cache(),
            x.string_start as u64,
            x.string_end as u64,
        )?;
        let mut second = SpanReader::open(
            self.right.source_cache(),
            y.string_start as u64,
            y.string_end as u64,
        )?;
        compare_streams(&mut first, &mut second)
    }

    pub fn compare_number_parts(&self, x: &IndexRecord, y: &IndexRecord) -> Result<Ordering> {
        if self.same_instance()
            && x.number_start == y.number_start
            && x.number_end == y.number_end
        {
            return Ok(Ordering::Equal);
        }

        // A span-encoded number overflowed i64, so it outranks any inline
        // value.
        match (x.number_is_inline(), y.number_is_inline()) {
            (true, true) => return Ok(x.number_start.cmp(&y.number_start)),
            (true, false) => return Ok(Ordering::Less),
            (false, true) => return Ok(Ordering::Greater),
            (false, false) => {}
        }

        let by_length = x.number_span_len().cmp(&y.number_span_len());
        if by_length != Ordering::Equal {
            return Ok(by_length);
        }

        let mut first = SpanReader::open(
            self.left.source_cache(),
            x.number_start as u64,
            x.number_end as u64,
        )?;
        let mut second = SpanReader::open(
            self.right.source_cache(),
            y.number_start as u64,
            y.number_end as u64,
        )?;
        compare_streams(&mut first, &mut second)
    }
}

impl ListComparer<IndexRecord> for RecordComparer<'_> {
    fn compare(&self, left: &IndexRecord, right: &IndexRecord) -> Result<Ordering> {
        let by_string = self.compare_string_parts(left, right)?;
        if by_string != Ordering::Equal {
            return Ok(by_string);
        }
        self.compare_number_parts(left, right)
    }
}

fn compare_streams(first: &mut SpanReader<'_>, second: &mut SpanReader<'_>) -> Result<Ordering> {
    loop {
        match (first.next_byte()?, second.next_byte()?) {
            (Some(a), Some(b)) => {
                if a != b {
                    return Ok(a.cmp(&b));
                }
            }
            (Some(_), None) => return Ok(Ordering::Greater),
            (None, Some(_)) => return Ok(Ordering::Less),
            (None, None) => return Ok(Ordering::Equal),
        }
    }
}

/// Byte iterator over a source-file span.
///
/// Short spans load whole through the page cache; longer ones stream in
/// chunks through a pooled handle, bypassing the cache so one comparison
/// cannot evict every resident page.
struct SpanReader<'c> {
    cache: &'c ShardedReadCache,
    handle: Option<HandleGuard>,
    buffer: Vec<u8>,
    consumed: usize,
    /// Next unread source position for the streamed refill.
    position: u64,
    end: u64,
}

impl<'c> SpanReader<'c> {
    fn open(cache: &'c ShardedReadCache, start: u64, end: u64) -> Result<Self> {
        let length = end.saturating_sub(start);
        if length < STREAM_BUFFER_SIZE as u64 {
            let mut buffer = vec![0u8; length as usize];
            let read = cache.read(start, &mut buffer)?;
            if (read as u64) < length {
                return Err(SortError::ShortRead {
                    path: cache.path().to_path_buf(),
                    offset: start + read as u64,
                });
            }
            return Ok(SpanReader {
                cache,
                handle: None,
                buffer,
                consumed: 0,
                position: end,
                end,
            });
        }

        Ok(SpanReader {
            cache,
            handle: Some(cache.request_handle()?),
            buffer: Vec::new(),
            consumed: 0,
            position: start,
            end,
        })
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.consumed < self.buffer.len() {
            let byte = self.buffer[self.consumed];
            self.consumed += 1;
            return Ok(Some(byte));
        }
        if self.position >= self.end {
            return Ok(None);
        }

        let handle = match &self.handle {
            Some(handle) => handle,
            // Buffered readers preload the whole span.
            None => return Ok(None),
        };
        let wanted = ((self.end - self.position) as usize).min(STREAM_BUFFER_SIZE);
        self.buffer.resize(wanted, 0);
        let read = handle.read_at(&mut self.buffer, self.position)?;
        if read == 0 {
            return Err(SortError::ShortRead {
                path: self.cache.path().to_path_buf(),
                offset: self.position,
            });
        }
        self.buffer.truncate(read);
        self.position += read as u64;
        self.consumed = 1;
        Ok(Some(self.buffer[0]))
    }
}
