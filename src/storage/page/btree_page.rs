use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::PageId;
use crate::storage::page::page::Page;

/// Tag stored in the first header field of every B+tree page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BTreePageType {
    Invalid = 0,
    Internal = 1,
    Leaf = 2,
}

impl BTreePageType {
    pub fn from_u32(raw: u32) -> Self {
        match raw {
            1 => BTreePageType::Internal,
            2 => BTreePageType::Leaf,
            _ => BTreePageType::Invalid,
        }
    }
}

/// Shared node header:
/// `page_type (u32) | size (i32) | max_size (i32) | parent_page_id (i32) | page_id (i32)`
pub const OFFSET_PAGE_TYPE: usize = 0;
pub const OFFSET_SIZE: usize = 4;
pub const OFFSET_MAX_SIZE: usize = 8;
pub const OFFSET_PARENT: usize = 12;
pub const OFFSET_PAGE_ID: usize = 16;
/// Leaf pages additionally carry `next_page_id (i32)`.
pub const OFFSET_NEXT_PAGE_ID: usize = 20;

pub const INTERNAL_HEADER_SIZE: usize = 20;
pub const LEAF_HEADER_SIZE: usize = 24;

/// Rewrites just the parent pointer, leaving the rest of the node intact.
/// Used when entries migrate between internal nodes and their children
/// must be re-adopted.
pub fn write_parent_page_id(page: &mut Page, parent_page_id: PageId) {
    LittleEndian::write_i32(&mut page.data[OFFSET_PARENT..OFFSET_PAGE_ID], parent_page_id);
}
