//! Read-only page cache sharded per rayon worker.
//!
//! The source text file is immutable while an index exists over it, so each
//! worker thread keeps a private page table and a private reader. Shards
//! never contend with each other; the per-shard mutex only matters for the
//! fallback slot shared by threads outside the pool.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::cache::paged::{HandleGuard, PooledFile, borrow_handle, lock};
use crate::error::{Result, SortError};

struct Page {
    /// Valid bytes; shorter than the page size only at end-of-file.
    data: Vec<u8>,
}

struct Shard {
    pages: HashMap<u64, Page>,
    /// LRU order, most recently used at the back.
    order: VecDeque<u64>,
    reader: File,
}

pub struct ShardedReadCache {
    path: PathBuf,
    page_size: usize,
    pages_count: usize,
    shards: Vec<Mutex<Shard>>,
    handles: Mutex<Vec<Arc<PooledFile>>>,
}

impl ShardedReadCache {
    /// Opens a cache over an existing file with one shard per rayon worker
    /// plus a fallback slot for threads outside the pool.
    pub fn open(path: &Path, page_size: usize, pages_count: usize) -> Result<Self> {
        if !path.is_file() {
            return Err(SortError::MissingSource {
                path: path.to_path_buf(),
            });
        }
        let shard_count = rayon::current_num_threads() + 1;
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(Mutex::new(Shard {
                pages: HashMap::new(),
                order: VecDeque::new(),
                reader: File::open(path)?,
            }));
        }
        Ok(ShardedReadCache {
            path: path.to_path_buf(),
            page_size: page_size.max(1),
            pages_count: pages_count.max(1),
            shards,
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads up to `buffer.len()` bytes at `position` through the calling
    /// worker's shard. Short at end-of-file, never an error.
    pub fn read(&self, position: u64, buffer: &mut [u8]) -> Result<usize> {
        let shard = &self.shards[self.shard_slot()];
        let mut shard = lock(shard);
        let mut page_position = (position / self.page_size as u64) * self.page_size as u64;

        let page = self.page_at(&mut shard, page_position)?;
        let offset = (position - page_position) as usize;
        let available = page.data.len().saturating_sub(offset);
        let mut count = available.min(buffer.len());
        buffer[..count].copy_from_slice(&page.data[offset..offset + count]);

        let mut page_full = page.data.len() == self.page_size;
        let mut total = count;
        page_position += self.page_size as u64;

        while page_full && total < buffer.len() {
            let page = self.page_at(&mut shard, page_position)?;
            count = page.data.len().min(buffer.len() - total);
            buffer[total..total + count].copy_from_slice(&page.data[..count]);
            page_full = page.data.len() == self.page_size;
            total += count;
            page_position += self.page_size as u64;
        }

        Ok(total)
    }

    /// Borrows a pooled read handle, for callers streaming long spans past
    /// the page cache.
    pub fn request_handle(&self) -> Result<HandleGuard> {
        let path = self.path.clone();
        borrow_handle(&self.handles, move || File::open(path))
    }

    /// Rayon workers map to slots 1..=N; any other thread shares slot 0.
    fn shard_slot(&self) -> usize {
        rayon::current_thread_index()
            .map(|index| index + 1)
            .unwrap_or(0)
            .min(self.shards.len() - 1)
    }

    fn page_at<'s>(&self, shard: &'s mut Shard, position: u64) -> Result<&'s mut Page> {
        if shard.order.back() == Some(&position) {
            return Ok(shard
                .pages
                .get_mut(&position)
                .unwrap_or_else(|| unreachable!("MRU page missing from shard")));
        }

        if shard.pages.contains_key(&position) {
            if let Some(slot) = shard.order.iter().position(|&p| p == position) {
                shard.order.remove(slot);
            }
            shard.order.push_back(position);
            return Ok(shard
                .pages
                .get_mut(&position)
                .unwrap_or_else(|| unreachable!("resident page missing from shard")));
        }

        // Reuse the evicted page's buffer instead of reallocating.
        let mut data = if shard.pages.len() >= self.pages_count {
            match shard.order.pop_front() {
                Some(victim) => shard
                    .pages
                    .remove(&victim)
                    .map(|page| page.data)
                    .unwrap_or_default(),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        data.resize(self.page_size, 0);
        let mut filled = 0usize;
        while filled < data.len() {
            let read = shard.reader.read_at(&mut data[filled..], position + filled as u64)?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        data.truncate(filled);

        shard.order.push_back(position);
        Ok(shard.pages.entry(position).or_insert(Page { data }))
    }
}
