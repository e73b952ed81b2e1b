//! Bounded-memory read/write window over one backing file.
//!
//! All random access to the index file goes through this cache: reads and
//! writes decompose into page-aligned segments, pages are kept in LRU order
//! up to a fixed budget, and dirty pages are written back on eviction and on
//! flush. File handles are pooled per access mode and never closed by the
//! borrower.

use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::ops::Deref;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// A pooled open file handle. `busy` is set while a borrower holds it.
pub(crate) struct PooledFile {
    file: File,
    busy: AtomicBool,
}

/// Scoped borrow of a pooled handle; returns it to the pool on drop.
pub struct HandleGuard {
    slot: Arc<PooledFile>,
}

impl Deref for HandleGuard {
    type Target = File;

    fn deref(&self) -> &File {
        &self.slot.file
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/// Borrow an idle handle from `pool`, or open a new one via `open`.
pub(crate) fn borrow_handle(
    pool: &Mutex<Vec<Arc<PooledFile>>>,
    open: impl FnOnce() -> std::io::Result<File>,
) -> Result<HandleGuard> {
    let mut pool = lock(pool);
    for slot in pool.iter() {
        if slot
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return Ok(HandleGuard { slot: Arc::clone(slot) });
        }
    }
    let slot = Arc::new(PooledFile {
        file: open()?,
        busy: AtomicBool::new(true),
    });
    pool.push(Arc::clone(&slot));
    Ok(HandleGuard { slot })
}

/// Poison-tolerant lock: a panicked writer cannot corrupt page bytes beyond
/// what flush would have written anyway.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Page {
    position: u64,
    /// Valid bytes of the page; `data.len()` tracks the valid length and
    /// never exceeds the page size.
    data: Vec<u8>,
    dirty: bool,
}

struct PageTable {
    /// Resident pages by position.
    pages: HashMap<u64, Page>,
    /// LRU order, most recently used at the back.
    order: VecDeque<u64>,
}

pub struct PagedFileCache {
    path: PathBuf,
    page_size: usize,
    pages_count: usize,
    table: Mutex<PageTable>,
    readers: Mutex<Vec<Arc<PooledFile>>>,
    writers: Mutex<Vec<Arc<PooledFile>>>,
    /// Kept open for the cache lifetime so pooled readers never race file
    /// creation; closed last when the cache drops.
    _primary: File,
}

impl PagedFileCache {
    /// Opens (creating if missing) a cache over `path`.
    pub fn open(path: &Path, page_size: usize, pages_count: usize) -> Result<Self> {
        let primary = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(PagedFileCache {
            path: path.to_path_buf(),
            page_size: page_size.max(1),
            pages_count: pages_count.max(1),
            table: Mutex::new(PageTable {
                pages: HashMap::new(),
                order: VecDeque::new(),
            }),
            readers: Mutex::new(Vec::new()),
            writers: Mutex::new(Vec::new()),
            _primary: primary,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads up to `buffer.len()` bytes starting at `position`.
    ///
    /// Returns the number of bytes read, which is short when the page run
    /// reaches end-of-file. Reading past the end is not an error.
    pub fn read(&self, position: u64, buffer: &mut [u8]) -> Result<usize> {
        let mut table = lock(&self.table);
        let mut page_position = (position / self.page_size as u64) * self.page_size as u64;

        let page = self.page_at(&mut table, page_position)?;
        let offset = (position - page_position) as usize;
        let available = page.data.len().saturating_sub(offset);
        let mut count = available.min(buffer.len());
        buffer[..count].copy_from_slice(&page.data[offset..offset + count]);

        let mut page_full = page.data.len() == self.page_size;
        let mut total = count;
        page_position += self.page_size as u64;

        while page_full && total < buffer.len() {
            let page = self.page_at(&mut table, page_position)?;
            count = page.data.len().min(buffer.len() - total);
            buffer[total..total + count].copy_from_slice(&page.data[..count]);
            page_full = page.data.len() == self.page_size;
            total += count;
            page_position += self.page_size as u64;
        }

        Ok(total)
    }

    /// Writes `buffer` at `position`, growing the file as needed.
    ///
    /// Touched pages are marked dirty and their valid length extends to
    /// cover the written range; the gap between a page's previous end and
    /// the write offset is zero-filled, never left with stale bytes.
    pub fn write(&self, position: u64, buffer: &[u8]) -> Result<()> {
        let mut table = lock(&self.table);
        let mut page_position = (position / self.page_size as u64) * self.page_size as u64;
        let mut offset = (position - page_position) as usize;
        let mut written = 0usize;

        while written < buffer.len() {
            let page_size = self.page_size;
            let page = self.page_at(&mut table, page_position)?;
            let end = (offset + buffer.len() - written).min(page_size);
            if page.data.len() < end {
                page.data.resize(end, 0);
            }
            let count = end - offset;
            page.data[offset..end].copy_from_slice(&buffer[written..written + count]);
            page.dirty = true;

            written += count;
            offset = 0;
            page_position += page_size as u64;
        }

        Ok(())
    }

    /// Borrows a pooled handle of the requested access mode.
    pub fn request_handle(&self, mode: AccessMode) -> Result<HandleGuard> {
        let path = self.path.clone();
        match mode {
            AccessMode::Read => borrow_handle(&self.readers, move || File::open(path)),
            AccessMode::Write => {
                borrow_handle(&self.writers, move || {
                    OpenOptions::new().write(true).open(path)
                })
            }
        }
    }

    /// Writes every dirty page back to the backing file. Safe to call any
    /// number of times; drop calls it best-effort.
    pub fn flush(&self) -> Result<()> {
        let mut table = lock(&self.table);
        let positions: Vec<u64> = table
            .pages
            .values()
            .filter(|p| p.dirty)
            .map(|p| p.position)
            .collect();
        for position in positions {
            self.flush_page(&mut table, position)?;
        }
        Ok(())
    }

    /// Resolves the page containing `position`, loading and possibly
    /// evicting under the held table lock. The resolved page becomes the
    /// most recently used.
    fn page_at<'t>(&self, table: &'t mut PageTable, position: u64) -> Result<&'t mut Page> {
        if table.order.back() == Some(&position) {
            return Ok(table
                .pages
                .get_mut(&position)
                .unwrap_or_else(|| unreachable!("MRU page missing from table")));
        }

        if table.pages.contains_key(&position) {
            if let Some(slot) = table.order.iter().position(|&p| p == position) {
                table.order.remove(slot);
            }
            table.order.push_back(position);
            return Ok(table
                .pages
                .get_mut(&position)
                .unwrap_or_else(|| unreachable!("resident page missing from table")));
        }

        // Miss: evict the least recently used page first if at capacity.
        if table.pages.len() >= self.pages_count {
            if let Some(victim) = table.order.pop_front() {
                let dirty = table.pages.get(&victim).map(|p| p.dirty).unwrap_or(false);
                if dirty {
                    self.flush_page(table, victim)?;
                }
                table.pages.remove(&victim);
            }
        }

        let page = self.load_page(position)?;
        table.order.push_back(position);
        Ok(table.pages.entry(position).or_insert(page))
    }

    /// Reads a page from the backing file. Beyond end-of-file the page is
    /// synthesized with valid length zero so later writes can grow it.
    fn load_page(&self, position: u64) -> Result<Page> {
        let handle = self.request_handle(AccessMode::Read)?;
        let mut data = vec![0u8; self.page_size];
        let mut filled = 0usize;
        while filled < data.len() {
            let read = handle.read_at(&mut data[filled..], position + filled as u64)?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        data.truncate(filled);
        Ok(Page {
            position,
            data,
            dirty: false,
        })
    }

    fn flush_page(&self, table: &mut PageTable, position: u64) -> Result<()> {
        let handle = self.request_handle(AccessMode::Write)?;
        if let Some(page) = table.pages.get_mut(&position) {
            handle.write_all_at(&page.data, page.position)?;
            page.dirty = false;
        }
        Ok(())
    }
}

impl Drop for PagedFileCache {
    fn drop(&mut self) {
        // Pooled handles close when their Arcs drop; the primary closes last.
        let _ = self.flush();
    }
}
