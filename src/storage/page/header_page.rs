use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::PageId;
use crate::storage::page::page::Page;

/// Bytes reserved for an index name inside a directory record.
pub const NAME_SIZE: usize = 32;
/// One record: fixed-width name plus the root page id.
pub const RECORD_SIZE: usize = NAME_SIZE + 4;

/// View over page 0, the directory mapping index names to root page ids.
///
/// Layout: `record_count (u32)` at offset 0, then `record_count` records of
/// `[name: 32 bytes, zero padded][root_page_id: i32]`.
pub struct HeaderPage<'a> {
    page: &'a mut Page,
}

impl<'a> HeaderPage<'a> {
    pub fn new(page: &'a mut Page) -> Self {
        Self { page }
    }

    pub fn record_count(&self) -> u32 {
        LittleEndian::read_u32(&self.page.data[0..4])
    }

    fn set_record_count(&mut self, count: u32) {
        LittleEndian::write_u32(&mut self.page.data[0..4], count);
    }

    fn record_offset(index: usize) -> usize {
        4 + index * RECORD_SIZE
    }

    fn name_at(&self, index: usize) -> &[u8] {
        let start = Self::record_offset(index);
        &self.page.data[start..start + NAME_SIZE]
    }

    fn find(&self, name: &str) -> Option<usize> {
        let mut name_buf = [0u8; NAME_SIZE];
        name_buf[..name.len()].copy_from_slice(name.as_bytes());
        (0..self.record_count() as usize).find(|&i| self.name_at(i) == name_buf)
    }

    /// Add a record; returns false if the name already exists, is too long,
    /// or the page is full.
    pub fn insert_record(&mut self, name: &str, root_id: PageId) -> bool {
        if name.len() >= NAME_SIZE || self.find(name).is_some() {
            return false;
        }
        let count = self.record_count() as usize;
        let offset = Self::record_offset(count);
        if offset + RECORD_SIZE > self.page.data.len() {
            return false;
        }
        self.page.data[offset..offset + NAME_SIZE].fill(0);
        self.page.data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        LittleEndian::write_i32(
            &mut self.page.data[offset + NAME_SIZE..offset + RECORD_SIZE],
            root_id,
        );
        self.set_record_count(count as u32 + 1);
        true
    }

    /// Overwrite an existing record's root id; false if absent.
    pub fn update_record(&mut self, name: &str, root_id: PageId) -> bool {
        match self.find(name) {
            Some(i) => {
                let offset = Self::record_offset(i) + NAME_SIZE;
                LittleEndian::write_i32(&mut self.page.data[offset..offset + 4], root_id);
                true
            }
            None => false,
        }
    }

    /// Remove a record, compacting the tail; false if absent.
    pub fn delete_record(&mut self, name: &str) -> bool {
        let Some(i) = self.find(name) else {
            return false;
        };
        let count = self.record_count() as usize;
        let start = Self::record_offset(i);
        let tail_start = Self::record_offset(i + 1);
        let tail_end = Self::record_offset(count);
        self.page.data.copy_within(tail_start..tail_end, start);
        self.set_record_count(count as u32 - 1);
        true
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        self.find(name).map(|i| {
            let offset = Self::record_offset(i) + NAME_SIZE;
            LittleEndian::read_i32(&self.page.data[offset..offset + 4])
        })
    }
}
