use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};

use crate::common::types::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// An in-memory page image. The surrounding `RwLock` is the page latch;
/// pin count and dirty bit live in the owning buffer pool frame.
#[derive(Debug)]
pub struct Page {
    pub page_id: PageId,
    pub data: [u8; PAGE_SIZE],
}

impl Page {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            data: [0; PAGE_SIZE],
        }
    }

    pub fn empty() -> Self {
        Self::new(INVALID_PAGE_ID)
    }

    pub fn reset(&mut self) {
        self.page_id = INVALID_PAGE_ID;
        self.data.fill(0);
    }
}

/// Shared handle to a resident page. Latching goes through the `RwLock`;
/// the `arc_lock` guards are owned, so a latch can outlive the scope that
/// acquired it (crab latching stores them in the transaction's page set).
pub type PagePtr = Arc<RwLock<Page>>;

pub type PageReadGuard = ArcRwLockReadGuard<RawRwLock, Page>;
pub type PageWriteGuard = ArcRwLockWriteGuard<RawRwLock, Page>;

/// A held page latch, read or write. Dropping it releases the latch;
/// the matching unpin is the holder's responsibility.
pub enum PageLatch {
    Read(PageReadGuard),
    Write(PageWriteGuard),
}

impl PageLatch {
    pub fn page_id(&self) -> PageId {
        match self {
            PageLatch::Read(guard) => guard.page_id,
            PageLatch::Write(guard) => guard.page_id,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, PageLatch::Write(_))
    }
}
