use std::fmt;

use serde::{Deserialize, Serialize};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page ID type; negative ids are never handed out
pub type PageId = i32;

/// Sentinel for "no page"
pub const INVALID_PAGE_ID: PageId = -1;

/// Page 0 holds the index-name -> root-page-id directory
pub const HEADER_PAGE_ID: PageId = 0;

/// Buffer pool frame ID type (index into the frame array)
pub type FrameId = usize;

/// Transaction ID type
pub type TxnId = u32;

/// Slot number within a table page
pub type SlotId = u32;

/// Row identifier: which page, which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl Rid {
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }

    pub fn invalid() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            slot: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.page_id != INVALID_PAGE_ID
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot)
    }
}
