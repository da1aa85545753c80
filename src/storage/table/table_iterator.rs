use std::sync::Arc;

use crate::common::types::{PageId, Rid, SlotId, INVALID_PAGE_ID};
use crate::storage::page::table_page::TablePageRef;
use crate::storage::table::table_heap::{HeapError, TableHeap};
use crate::storage::table::tuple::Tuple;

/// Walks a table heap's page chain slot by slot, skipping tombstones and
/// mark-deleted rows. Pages are pinned only for the duration of one probe.
pub struct TableIterator {
    heap: Arc<TableHeap>,
    page_id: PageId,
    slot: SlotId,
}

impl TableIterator {
    pub(crate) fn new(heap: Arc<TableHeap>) -> Self {
        let page_id = heap.first_page_id();
        Self {
            heap,
            page_id,
            slot: 0,
        }
    }

    /// Advance to the next live row, or None at the end of the chain.
    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>, HeapError> {
        while self.page_id != INVALID_PAGE_ID {
            let page = self.heap.buffer_pool().fetch_page(self.page_id)?;
            let (found, next_page_id) = {
                let guard = page.read();
                let view = TablePageRef::new(&guard);
                let count = view.tuple_count();
                let mut found = None;
                while self.slot < count {
                    let slot = self.slot;
                    self.slot += 1;
                    if view.is_marked_deleted(slot) {
                        continue;
                    }
                    if let Some(data) = view.get_tuple(slot) {
                        let rid = Rid::new(self.page_id, slot);
                        found = Some((Tuple::from_bytes(rid, data), rid));
                        break;
                    }
                }
                (found, view.next_page_id())
            };
            self.heap.buffer_pool().unpin_page(self.page_id, false);

            if found.is_some() {
                return Ok(found);
            }
            self.page_id = next_page_id;
            self.slot = 0;
        }
        Ok(None)
    }
}
