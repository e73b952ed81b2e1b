//! File-backed list of index records over one source text file.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::cache::{PagedFileCache, ShardedReadCache};
use crate::error::{Result, SortError};
use crate::index::parser;
use crate::index::record::{IndexRecord, RECORD_SIZE};
use crate::list::LargeList;
use crate::options::{CacheLayout, IndexOptions};

/// The index file as a random-access record list, with a bounded page cache
/// over the index and per-worker read caches over the source text.
///
/// Gets and sets are safe to issue from rayon workers concurrently. The
/// index file is flushed on [`close`](FileIndex::close) (or on drop, best
/// effort) and optionally deleted afterwards.
pub struct FileIndex {
    options: IndexOptions,
    layout: CacheLayout,
    index_cache: PagedFileCache,
    source_cache: ShardedReadCache,
    count: AtomicU64,
    cleanup: bool,
    closed: AtomicBool,
}

impl FileIndex {
    /// Opens the index described by `options`. With `rebuild` the index
    /// file is regenerated from the source text first; with `cleanup` the
    /// index file is deleted when the index closes.
    pub fn open(options: IndexOptions, rebuild: bool, cleanup: bool) -> Result<Self> {
        let layout = CacheLayout::new(options.cache_megabytes, options.parallel);

        if rebuild {
            parser::convert_text_to_index(
                &options.source_path,
                &options.index_path,
                options.encoding,
            )?;
        }

        let count = match std::fs::metadata(&options.index_path) {
            Ok(meta) => meta.len() / RECORD_SIZE as u64,
            Err(_) => 0,
        };

        let index_cache =
            PagedFileCache::open(&options.index_path, layout.page_size, layout.pages_shared)?;
        let source_cache = ShardedReadCache::open(
            &options.source_path,
            layout.page_size,
            layout.pages_per_worker,
        )?;

        Ok(FileIndex {
            options,
            layout,
            index_cache,
            source_cache,
            count: AtomicU64::new(count),
            cleanup,
            closed: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn source_cache(&self) -> &ShardedReadCache {
        &self.source_cache
    }

    pub fn index_path(&self) -> &Path {
        &self.options.index_path
    }

    /// Flushes the index file and, when requested at open, deletes it.
    pub fn close(self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.index_cache.flush()?;
        if self.cleanup {
            std::fs::remove_file(&self.options.index_path)?;
        }
        Ok(())
    }
}

impl LargeList<IndexRecord> for FileIndex {
    fn get(&self, index: u64) -> Result<IndexRecord> {
        let mut buffer = [0u8; RECORD_SIZE];
        let position = index * RECORD_SIZE as u64;
        let read = self.index_cache.read(position, &mut buffer)?;
        if read < RECORD_SIZE {
            return Err(SortError::ShortRead {
                path: self.options.index_path.clone(),
                offset: position + read as u64,
            });
        }
        Ok(IndexRecord::decode(&buffer))
    }

    fn set(&self, index: u64, value: IndexRecord) -> Result<()> {
        let position = index * RECORD_SIZE as u64;
        self.index_cache.write(position, &value.encode())?;
        self.count.fetch_max(index + 1, Ordering::AcqRel);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn buffer_limit(&self) -> u64 {
        self.layout.buffer_limit
    }
}

impl Drop for FileIndex {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.index_cache.flush();
        if self.cleanup {
            let _ = std::fs::remove_file(&self.options.index_path);
        }
    }
}
