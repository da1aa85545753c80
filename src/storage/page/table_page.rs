use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{PageId, SlotId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::page::page::Page;

/// Header: next_page_id (i32) | prev_page_id (i32) | free_space_offset (u32)
/// | tuple_count (u32)
pub const TABLE_PAGE_HEADER_SIZE: usize = 16;
/// Slot entry: offset (u32) | size (u32), growing backwards from the page end
pub const SLOT_SIZE: usize = 8;

/// High bit of a slot's size field marks the tuple as deleted-but-present
/// (mark-delete, awaiting commit).
const DELETE_MASK: u32 = 1 << 31;

fn is_marked(size: u32) -> bool {
    size & DELETE_MASK != 0
}

fn unmask(size: u32) -> u32 {
    size & !DELETE_MASK
}

fn slot_pos(slot: SlotId) -> usize {
    PAGE_SIZE - SLOT_SIZE * (slot as usize + 1)
}

fn read_slot(page: &Page, slot: SlotId) -> (u32, u32) {
    let pos = slot_pos(slot);
    let offset = LittleEndian::read_u32(&page.data[pos..pos + 4]);
    let size = LittleEndian::read_u32(&page.data[pos + 4..pos + 8]);
    (offset, size)
}

fn read_tuple_count(page: &Page) -> u32 {
    LittleEndian::read_u32(&page.data[12..16])
}

/// Read-only view over a slotted table heap page.
///
/// Tuple bytes grow forward from the header; the slot array grows backward
/// from the page end. A slot with size 0 is a tombstone (tuple physically
/// removed); the delete mask keeps the bytes around until commit.
pub struct TablePageRef<'a> {
    page: &'a Page,
}

impl<'a> TablePageRef<'a> {
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    pub fn next_page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.page.data[0..4])
    }

    pub fn prev_page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.page.data[4..8])
    }

    pub fn tuple_count(&self) -> u32 {
        read_tuple_count(self.page)
    }

    /// Read a tuple's bytes. Deleted tombstones return None; mark-deleted
    /// tuples are still readable until the delete is applied.
    pub fn get_tuple(&self, slot: SlotId) -> Option<Vec<u8>> {
        if slot >= self.tuple_count() {
            return None;
        }
        let (offset, size) = read_slot(self.page, slot);
        let len = unmask(size);
        if len == 0 {
            return None;
        }
        Some(self.page.data[offset as usize..offset as usize + len as usize].to_vec())
    }

    pub fn is_marked_deleted(&self, slot: SlotId) -> bool {
        slot < self.tuple_count() && is_marked(read_slot(self.page, slot).1)
    }
}

/// Mutating view over a slotted table heap page.
pub struct TablePageMut<'a> {
    page: &'a mut Page,
}

impl<'a> TablePageMut<'a> {
    pub fn new(page: &'a mut Page) -> Self {
        Self { page }
    }

    pub fn init(&mut self, prev_page_id: PageId) {
        self.set_next_page_id(INVALID_PAGE_ID);
        self.set_prev_page_id(prev_page_id);
        self.set_free_space_offset(TABLE_PAGE_HEADER_SIZE as u32);
        self.set_tuple_count(0);
    }

    pub fn next_page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.page.data[0..4])
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        LittleEndian::write_i32(&mut self.page.data[0..4], page_id);
    }

    pub fn set_prev_page_id(&mut self, page_id: PageId) {
        LittleEndian::write_i32(&mut self.page.data[4..8], page_id);
    }

    fn free_space_offset(&self) -> u32 {
        LittleEndian::read_u32(&self.page.data[8..12])
    }

    fn set_free_space_offset(&mut self, offset: u32) {
        LittleEndian::write_u32(&mut self.page.data[8..12], offset);
    }

    pub fn tuple_count(&self) -> u32 {
        read_tuple_count(self.page)
    }

    fn set_tuple_count(&mut self, count: u32) {
        LittleEndian::write_u32(&mut self.page.data[12..16], count);
    }

    fn set_slot(&mut self, slot: SlotId, offset: u32, size: u32) {
        let pos = slot_pos(slot);
        LittleEndian::write_u32(&mut self.page.data[pos..pos + 4], offset);
        LittleEndian::write_u32(&mut self.page.data[pos + 4..pos + 8], size);
    }

    fn free_space(&self) -> usize {
        let slot_array_start = PAGE_SIZE - SLOT_SIZE * self.tuple_count() as usize;
        slot_array_start - self.free_space_offset() as usize
    }

    pub fn get_tuple(&self, slot: SlotId) -> Option<Vec<u8>> {
        TablePageRef::new(&*self.page).get_tuple(slot)
    }

    /// Append a tuple; returns its slot, or None when the page cannot hold
    /// it (caller moves on to the next page).
    pub fn insert_tuple(&mut self, data: &[u8]) -> Option<SlotId> {
        if data.len() + SLOT_SIZE > self.free_space() {
            return None;
        }
        let offset = self.free_space_offset();
        let slot = self.tuple_count();
        self.page.data[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        self.set_slot(slot, offset, data.len() as u32);
        self.set_free_space_offset(offset + data.len() as u32);
        self.set_tuple_count(slot + 1);
        Some(slot)
    }

    /// First phase of a delete: flag the slot, keep the bytes.
    pub fn mark_delete(&mut self, slot: SlotId) -> bool {
        if slot >= self.tuple_count() {
            return false;
        }
        let (offset, size) = read_slot(self.page, slot);
        if unmask(size) == 0 || is_marked(size) {
            return false;
        }
        self.set_slot(slot, offset, size | DELETE_MASK);
        true
    }

    /// Second phase: drop the bytes for good (commit path).
    pub fn apply_delete(&mut self, slot: SlotId) -> bool {
        if slot >= self.tuple_count() {
            return false;
        }
        let (offset, size) = read_slot(self.page, slot);
        if unmask(size) == 0 {
            return false;
        }
        self.set_slot(slot, offset, 0);
        true
    }

    /// Undo a mark_delete (abort path).
    pub fn rollback_delete(&mut self, slot: SlotId) -> bool {
        if slot >= self.tuple_count() {
            return false;
        }
        let (offset, size) = read_slot(self.page, slot);
        if !is_marked(size) {
            return false;
        }
        self.set_slot(slot, offset, unmask(size));
        true
    }

    /// Rewrite a tuple in place. Fits-in-old-footprint updates reuse the
    /// slot; a larger tuple is appended to free space if it fits; otherwise
    /// the update is refused.
    pub fn update_tuple(&mut self, slot: SlotId, data: &[u8]) -> bool {
        if slot >= self.tuple_count() {
            return false;
        }
        let (offset, size) = read_slot(self.page, slot);
        let old_len = unmask(size);
        if old_len == 0 || is_marked(size) {
            return false;
        }
        if data.len() as u32 <= old_len {
            self.page.data[offset as usize..offset as usize + data.len()].copy_from_slice(data);
            self.set_slot(slot, offset, data.len() as u32);
            return true;
        }
        if data.len() > self.free_space() {
            return false;
        }
        let new_offset = self.free_space_offset();
        self.page.data[new_offset as usize..new_offset as usize + data.len()]
            .copy_from_slice(data);
        self.set_slot(slot, new_offset, data.len() as u32);
        self.set_free_space_offset(new_offset + data.len() as u32);
        true
    }
}

/// Largest tuple an empty page can take.
pub fn max_tuple_size() -> usize {
    PAGE_SIZE - TABLE_PAGE_HEADER_SIZE - SLOT_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_page() -> Page {
        let mut page = Page::new(1);
        TablePageMut::new(&mut page).init(INVALID_PAGE_ID);
        page
    }

    #[test]
    fn test_insert_and_get() {
        let mut page = fresh_page();
        let mut view = TablePageMut::new(&mut page);

        let a = view.insert_tuple(b"hello").unwrap();
        let b = view.insert_tuple(b"world!").unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);

        let view = TablePageRef::new(&page);
        assert_eq!(view.get_tuple(a).unwrap(), b"hello");
        assert_eq!(view.get_tuple(b).unwrap(), b"world!");
        assert_eq!(view.get_tuple(2), None);
    }

    #[test]
    fn test_delete_lifecycle() {
        let mut page = fresh_page();
        let mut view = TablePageMut::new(&mut page);

        let slot = view.insert_tuple(b"row").unwrap();
        assert!(view.mark_delete(slot));
        // marked rows are still readable until the delete is applied
        assert_eq!(view.get_tuple(slot).unwrap(), b"row");
        assert!(TablePageRef::new(&page).is_marked_deleted(slot));

        let mut view = TablePageMut::new(&mut page);
        assert!(view.rollback_delete(slot));
        assert!(!TablePageRef::new(&page).is_marked_deleted(slot));

        let mut view = TablePageMut::new(&mut page);
        assert!(view.mark_delete(slot));
        assert!(view.apply_delete(slot));
        assert_eq!(view.get_tuple(slot), None);
    }

    #[test]
    fn test_update_grows_into_free_space() {
        let mut page = fresh_page();
        let mut view = TablePageMut::new(&mut page);

        let slot = view.insert_tuple(b"ab").unwrap();
        assert!(view.update_tuple(slot, b"a"));
        assert_eq!(view.get_tuple(slot).unwrap(), b"a");
        assert!(view.update_tuple(slot, b"a much longer payload"));
        assert_eq!(view.get_tuple(slot).unwrap(), b"a much longer payload");
    }

    #[test]
    fn test_page_full() {
        let mut page = fresh_page();
        let mut view = TablePageMut::new(&mut page);

        let big = vec![7u8; max_tuple_size()];
        assert!(view.insert_tuple(&big).is_some());
        assert!(view.insert_tuple(b"x").is_none());
    }
}
