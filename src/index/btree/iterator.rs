use std::sync::Arc;

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, IndexKey};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::page::PageReadGuard;

struct LeafPos<K> {
    page_id: PageId,
    // the read latch on the current leaf; held for the iterator's lifetime
    _guard: PageReadGuard,
    entries: Vec<(K, Rid)>,
    next_page_id: PageId,
}

/// Forward scan over the leaf chain. Holds a read latch and a pin on the
/// current leaf only; hopping to the next leaf releases the current one
/// before latching its successor. The end sentinel reports position
/// `(-1, -1)`.
pub struct TreeIterator<K: IndexKey> {
    buffer_pool: Arc<BufferPoolManager>,
    leaf: Option<LeafPos<K>>,
    index: usize,
}

impl<K: IndexKey> TreeIterator<K> {
    pub(crate) fn end(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            buffer_pool,
            leaf: None,
            index: 0,
        }
    }

    pub(crate) fn from_leaf(
        buffer_pool: Arc<BufferPoolManager>,
        page_id: PageId,
        guard: PageReadGuard,
        index: usize,
    ) -> Result<Self, BTreeError> {
        let leaf = match BTreeNode::<K>::decode(&guard) {
            Ok(BTreeNode::Leaf(leaf)) => leaf,
            other => {
                drop(guard);
                buffer_pool.unpin_page(page_id, false);
                other?;
                return Err(BTreeError::CorruptPage(page_id));
            }
        };
        let mut iter = Self {
            buffer_pool,
            leaf: Some(LeafPos {
                page_id,
                _guard: guard,
                entries: leaf.entries,
                next_page_id: leaf.next_page_id,
            }),
            index,
        };
        iter.normalize()?;
        Ok(iter)
    }

    pub fn is_end(&self) -> bool {
        self.leaf.is_none()
    }

    /// `(page_id, index)` of the cursor; `(-1, -1)` at the end.
    pub fn position(&self) -> (PageId, i32) {
        match &self.leaf {
            Some(pos) => (pos.page_id, self.index as i32),
            None => (INVALID_PAGE_ID, -1),
        }
    }

    pub fn current(&self) -> Option<(&K, Rid)> {
        let pos = self.leaf.as_ref()?;
        pos.entries.get(self.index).map(|(k, rid)| (k, *rid))
    }

    /// Step to the next entry, hopping the leaf chain as needed.
    pub fn advance(&mut self) -> Result<(), BTreeError> {
        if self.leaf.is_none() {
            return Ok(());
        }
        self.index += 1;
        self.normalize()
    }

    /// Walk forward until the cursor rests on a real entry or the chain
    /// runs out.
    fn normalize(&mut self) -> Result<(), BTreeError> {
        loop {
            let Some(pos) = &self.leaf else {
                return Ok(());
            };
            if self.index < pos.entries.len() {
                return Ok(());
            }
            let next_page_id = pos.next_page_id;
            self.release_current();
            if next_page_id == INVALID_PAGE_ID {
                return Ok(());
            }
            let page = self.buffer_pool.fetch_page(next_page_id)?;
            let guard = page.read_arc();
            let leaf = match BTreeNode::<K>::decode(&guard) {
                Ok(BTreeNode::Leaf(leaf)) => leaf,
                other => {
                    drop(guard);
                    self.buffer_pool.unpin_page(next_page_id, false);
                    other?;
                    return Err(BTreeError::CorruptPage(next_page_id));
                }
            };
            self.leaf = Some(LeafPos {
                page_id: next_page_id,
                _guard: guard,
                entries: leaf.entries,
                next_page_id: leaf.next_page_id,
            });
            self.index = 0;
        }
    }

    /// Unlatch and unpin the current leaf, leaving the iterator at end.
    fn release_current(&mut self) {
        if let Some(pos) = self.leaf.take() {
            let page_id = pos.page_id;
            drop(pos);
            self.buffer_pool.unpin_page(page_id, false);
        }
        self.index = 0;
    }
}

impl<K: IndexKey> Drop for TreeIterator<K> {
    fn drop(&mut self) {
        self.release_current();
    }
}
