use std::sync::Arc;

use thiserror::Error;

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};
use crate::storage::buffer::{BufferPoolError, BufferPoolManager};
use crate::storage::page::table_page::{self, TablePageMut, TablePageRef};
use crate::storage::table::table_iterator::TableIterator;
use crate::storage::table::tuple::{Tuple, TupleError};
use crate::transaction::transaction::{TableWriteRecord, Transaction, WriteType};

#[derive(Error, Debug)]
pub enum HeapError {
    #[error("tuple of {0} bytes exceeds a single page")]
    TupleTooLarge(usize),

    #[error("buffer pool error: {0}")]
    Buffer(#[from] BufferPoolError),

    #[error("tuple error: {0}")]
    Tuple(#[from] TupleError),
}

/// A table stored as a doubly linked chain of slotted pages.
///
/// The heap records undo information on the transaction; row locks are the
/// callers' business (the executors take them per isolation level before
/// touching a RID).
pub struct TableHeap {
    buffer_pool: Arc<BufferPoolManager>,
    first_page_id: PageId,
}

impl TableHeap {
    /// Create an empty heap with one fresh page.
    pub fn new(buffer_pool: Arc<BufferPoolManager>) -> Result<Self, HeapError> {
        let (page, page_id) = buffer_pool.new_page()?;
        {
            let mut guard = page.write();
            TablePageMut::new(&mut guard).init(INVALID_PAGE_ID);
        }
        buffer_pool.unpin_page(page_id, true);
        Ok(Self {
            buffer_pool,
            first_page_id: page_id,
        })
    }

    /// Re-open an existing heap rooted at a known first page.
    pub fn open(buffer_pool: Arc<BufferPoolManager>, first_page_id: PageId) -> Self {
        Self {
            buffer_pool,
            first_page_id,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }

    /// Append a tuple, extending the page chain when the tail is full.
    /// Fills in the tuple's RID and records the insert for rollback.
    pub fn insert_tuple(
        self: &Arc<Self>,
        tuple: &mut Tuple,
        txn: &Transaction,
    ) -> Result<Rid, HeapError> {
        if tuple.size() > table_page::max_tuple_size() {
            return Err(HeapError::TupleTooLarge(tuple.size()));
        }

        let mut page_id = self.first_page_id;
        loop {
            let page = self.buffer_pool.fetch_page(page_id)?;
            let (slot, next_page_id) = {
                let mut guard = page.write();
                let mut view = TablePageMut::new(&mut guard);
                (view.insert_tuple(&tuple.data), view.next_page_id())
            };

            if let Some(slot) = slot {
                self.buffer_pool.unpin_page(page_id, true);
                let rid = Rid::new(page_id, slot);
                tuple.rid = rid;
                txn.append_table_write(TableWriteRecord {
                    rid,
                    write_type: WriteType::Insert,
                    old_tuple: None,
                    table: self.clone(),
                });
                return Ok(rid);
            }

            if next_page_id != INVALID_PAGE_ID {
                self.buffer_pool.unpin_page(page_id, false);
                page_id = next_page_id;
                continue;
            }

            // Tail is full: link a fresh page and retry there.
            let (new_page, new_page_id) = self.buffer_pool.new_page()?;
            {
                let mut guard = new_page.write();
                TablePageMut::new(&mut guard).init(page_id);
            }
            {
                let mut guard = page.write();
                TablePageMut::new(&mut guard).set_next_page_id(new_page_id);
            }
            self.buffer_pool.unpin_page(page_id, true);
            self.buffer_pool.unpin_page(new_page_id, true);
            page_id = new_page_id;
        }
    }

    /// Flag a row as deleted; the bytes stay until commit applies them.
    pub fn mark_delete(self: &Arc<Self>, rid: Rid, txn: &Transaction) -> Result<bool, HeapError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let (marked, old_tuple) = {
            let mut guard = page.write();
            let mut view = TablePageMut::new(&mut guard);
            let old = view.get_tuple(rid.slot);
            (view.mark_delete(rid.slot), old)
        };
        self.buffer_pool.unpin_page(rid.page_id, marked);
        if marked {
            txn.append_table_write(TableWriteRecord {
                rid,
                write_type: WriteType::Delete,
                old_tuple: old_tuple.map(|data| Tuple::from_bytes(rid, data)),
                table: self.clone(),
            });
        }
        Ok(marked)
    }

    /// Physically remove a row (commit path, and abort path for inserts).
    pub fn apply_delete(&self, rid: Rid) -> Result<bool, HeapError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let applied = {
            let mut guard = page.write();
            TablePageMut::new(&mut guard).apply_delete(rid.slot)
        };
        self.buffer_pool.unpin_page(rid.page_id, applied);
        Ok(applied)
    }

    /// Undo a mark_delete (abort path).
    pub fn rollback_delete(&self, rid: Rid) -> Result<bool, HeapError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let rolled_back = {
            let mut guard = page.write();
            TablePageMut::new(&mut guard).rollback_delete(rid.slot)
        };
        self.buffer_pool.unpin_page(rid.page_id, rolled_back);
        Ok(rolled_back)
    }

    /// Rewrite a row in place, recording the pre-image.
    pub fn update_tuple(
        self: &Arc<Self>,
        new_tuple: &Tuple,
        rid: Rid,
        txn: &Transaction,
    ) -> Result<bool, HeapError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let (updated, old_tuple) = {
            let mut guard = page.write();
            let mut view = TablePageMut::new(&mut guard);
            let old = view.get_tuple(rid.slot);
            (view.update_tuple(rid.slot, &new_tuple.data), old)
        };
        self.buffer_pool.unpin_page(rid.page_id, updated);
        if updated {
            txn.append_table_write(TableWriteRecord {
                rid,
                write_type: WriteType::Update,
                old_tuple: old_tuple.map(|data| Tuple::from_bytes(rid, data)),
                table: self.clone(),
            });
        }
        Ok(updated)
    }

    /// Restore a pre-image without recording anything (abort path).
    pub fn restore_tuple(&self, old_tuple: &Tuple, rid: Rid) -> Result<bool, HeapError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let restored = {
            let mut guard = page.write();
            TablePageMut::new(&mut guard).update_tuple(rid.slot, &old_tuple.data)
        };
        self.buffer_pool.unpin_page(rid.page_id, restored);
        Ok(restored)
    }

    /// Read a row. None for tombstones and out-of-range slots; mark-deleted
    /// rows are still visible to their own transaction.
    pub fn get_tuple(&self, rid: Rid) -> Result<Option<Tuple>, HeapError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let data = {
            let guard = page.read();
            TablePageRef::new(&guard).get_tuple(rid.slot)
        };
        self.buffer_pool.unpin_page(rid.page_id, false);
        Ok(data.map(|bytes| Tuple::from_bytes(rid, bytes)))
    }

    /// Scan the heap in RID order, skipping deleted and marked rows.
    pub fn iter(self: &Arc<Self>) -> TableIterator {
        TableIterator::new(self.clone())
    }
}
