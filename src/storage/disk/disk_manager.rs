use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
}

/// DiskManager owns the database file and hands out page ids.
///
/// The file is a flat array of pages; page `n` lives at byte offset
/// `n * PAGE_SIZE`. Reads past the end of the file return zeroed bytes so a
/// freshly allocated page materializes empty.
pub struct DiskManager {
    db_file: Mutex<File>,
    next_page_id: AtomicI32,
    free_pages: Mutex<BTreeSet<PageId>>,
}

impl DiskManager {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;

        // Page 0 is permanently the header page and is never handed out.
        let file_size = file.metadata()?.len();
        let next_page_id = (file_size as usize / PAGE_SIZE).max(1) as PageId;

        Ok(Self {
            db_file: Mutex::new(file),
            next_page_id: AtomicI32::new(next_page_id),
            free_pages: Mutex::new(BTreeSet::new()),
        })
    }

    /// Read a page from disk into the caller's buffer.
    pub fn read_page(
        &self,
        page_id: PageId,
        buf: &mut [u8; PAGE_SIZE],
    ) -> Result<(), DiskManagerError> {
        if page_id == INVALID_PAGE_ID || page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.db_file.lock();
        let file_size = file.metadata()?.len();

        // Not yet written: the page reads back as zeroes.
        if offset >= file_size {
            buf.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Write a page to disk.
    pub fn write_page(&self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<(), DiskManagerError> {
        if page_id == INVALID_PAGE_ID || page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(())
    }

    /// Hand out a page id, reusing deallocated ids before extending the file.
    pub fn allocate_page(&self) -> PageId {
        let mut free = self.free_pages.lock();
        if let Some(&page_id) = free.iter().next() {
            free.remove(&page_id);
            return page_id;
        }
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Return a page id to the allocator.
    pub fn deallocate_page(&self, page_id: PageId) {
        if page_id == INVALID_PAGE_ID || page_id < 0 {
            return;
        }
        self.free_pages.lock().insert(page_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_read_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let disk = DiskManager::new(file.path()).unwrap();

        let page_id = disk.allocate_page();
        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xAB;
        data[PAGE_SIZE - 1] = 0xCD;
        disk.write_page(page_id, &data).unwrap();

        let mut read_back = [0u8; PAGE_SIZE];
        disk.read_page(page_id, &mut read_back).unwrap();
        assert_eq!(data[..], read_back[..]);
    }

    #[test]
    fn test_read_past_eof_is_zeroed() {
        let file = NamedTempFile::new().unwrap();
        let disk = DiskManager::new(file.path()).unwrap();

        let mut buf = [0xFFu8; PAGE_SIZE];
        disk.read_page(7, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_allocate_reuses_deallocated_ids() {
        let file = NamedTempFile::new().unwrap();
        let disk = DiskManager::new(file.path()).unwrap();

        // ids start at 1; page 0 is reserved for the header page
        let first = disk.allocate_page();
        let second = disk.allocate_page();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        disk.deallocate_page(first);
        assert_eq!(disk.allocate_page(), first);
        assert_eq!(disk.allocate_page(), 3);
    }
}
