use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::common::types::{FrameId, PageId, INVALID_PAGE_ID};
use crate::storage::buffer::lru_replacer::LruReplacer;
use crate::storage::disk::{DiskManager, DiskManagerError};
use crate::storage::page::page::{Page, PagePtr};

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("all frames are pinned")]
    PoolExhausted,

    #[error("invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("disk manager error: {0}")]
    Disk(#[from] DiskManagerError),
}

struct Frame {
    page: PagePtr,
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

impl Frame {
    fn new() -> Self {
        Self {
            page: Arc::new(RwLock::new(Page::empty())),
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }
}

struct PoolInner {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// Fixed-size page cache fronting the disk manager. All state transitions
/// (pin counts, residency, dirty bits) are serialized on one pool mutex;
/// page contents are protected by the per-page latch, never by the pool.
pub struct BufferPoolManager {
    pool_size: usize,
    inner: Mutex<PoolInner>,
    replacer: LruReplacer,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list = (0..pool_size).collect();
        Self {
            pool_size,
            inner: Mutex::new(PoolInner {
                frames,
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
            disk_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Bring a page into the pool (or find it there) and pin it.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID || page_id < 0 {
            return Err(BufferPoolError::InvalidPageId(page_id));
        }

        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &mut inner.frames[frame_id];
            frame.pin_count += 1;
            let page = frame.page.clone();
            self.replacer.pin(frame_id);
            return Ok(page);
        }

        let frame_id = self.acquire_frame(&mut inner)?;

        // Read the page image before publishing it in the table. The frame
        // gets a fresh Arc so any stale handle to the evicted page keeps
        // pointing at the old image.
        let mut page = Page::new(page_id);
        if let Err(e) = self.disk_manager.read_page(page_id, &mut page.data) {
            inner.free_list.push_back(frame_id);
            return Err(e.into());
        }

        let frame = &mut inner.frames[frame_id];
        frame.page = Arc::new(RwLock::new(page));
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;
        let page = frame.page.clone();
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok(page)
    }

    /// Allocate a brand new page on disk and pin it, zero-filled.
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let mut inner = self.inner.lock();
        let frame_id = self.acquire_frame(&mut inner)?;

        let page_id = self.disk_manager.allocate_page();

        let frame = &mut inner.frames[frame_id];
        frame.page = Arc::new(RwLock::new(Page::new(page_id)));
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;
        let page = frame.page.clone();
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok((page, page_id))
    }

    /// Drop one pin; OR-merge the caller's dirty flag. Returns false if the
    /// page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let frame = &mut inner.frames[frame_id];
        if is_dirty {
            frame.is_dirty = true;
        }
        if frame.pin_count == 0 {
            return false;
        }
        frame.pin_count -= 1;
        if frame.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Write a resident page to disk and clear its dirty bit. Returns false
    /// if the page is not resident or the write failed.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let frame = &mut inner.frames[frame_id];
        let data = frame.page.read().data;
        if let Err(e) = self.disk_manager.write_page(page_id, &data) {
            log::error!("flush of page {} failed: {}", page_id, e);
            return false;
        }
        frame.is_dirty = false;
        true
    }

    pub fn flush_all_pages(&self) {
        let page_ids: Vec<PageId> = {
            let inner = self.inner.lock();
            inner.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            self.flush_page(page_id);
        }
    }

    /// Deallocate a page. True if the page was absent or successfully
    /// removed; false while anyone still holds a pin. A dirty image is
    /// discarded, not flushed: the page is gone either way.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return true;
        };
        let frame = &mut inner.frames[frame_id];
        if frame.pin_count > 0 {
            return false;
        }
        frame.page = Arc::new(RwLock::new(Page::empty()));
        frame.page_id = INVALID_PAGE_ID;
        frame.is_dirty = false;
        inner.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        inner.free_list.push_back(frame_id);
        self.disk_manager.deallocate_page(page_id);
        true
    }

    /// Free-frame count as seen by the replacer (test hook).
    pub fn replacer_size(&self) -> usize {
        self.replacer.size()
    }

    /// Find a frame for a new resident: free list first, then evict the
    /// replacer's victim, writing it back if dirty.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.replacer.victim() else {
            return Err(BufferPoolError::PoolExhausted);
        };

        let frame = &mut inner.frames[frame_id];
        if frame.is_dirty {
            log::debug!("evicting dirty page {}", frame.page_id);
            let data = frame.page.read().data;
            self.disk_manager.write_page(frame.page_id, &data)?;
            frame.is_dirty = false;
        }
        let old_page_id = frame.page_id;
        if old_page_id != INVALID_PAGE_ID {
            inner.page_table.remove(&old_page_id);
        }
        Ok(frame_id)
    }
}
