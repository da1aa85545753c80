use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::types::{PageId, Rid, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::iterator::TreeIterator;
use crate::index::btree::node::{
    internal_capacity, leaf_capacity, BTreeNode, IndexKey, InternalNode, LeafNode,
};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::btree_page;
use crate::storage::page::header_page::HeaderPage;
use crate::storage::page::page::PageLatch;
use crate::transaction::transaction::{PageSet, Transaction};

/// What a traversal intends to do; decides latch modes and safety rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Read,
    Insert,
    Delete,
}

/// Concurrent B+tree over fixed-width keys, pages owned by the buffer pool.
///
/// Traversals crab top-down: a child is latched before its parent is
/// released, and for writes the ancestors stay latched until the child is
/// proven safe. The transaction's page set carries the held latches and the
/// pages scheduled for deletion; `release_all` drains both.
///
/// `root_page_id` doubles as the root latch: every root transition happens
/// under this mutex, and traversals re-check the id after latching the
/// candidate root page, restarting if a writer moved it in between.
pub struct BPlusTree<K: IndexKey> {
    index_name: String,
    buffer_pool: Arc<BufferPoolManager>,
    root_page_id: Mutex<PageId>,
    leaf_max_size: u32,
    internal_max_size: u32,
    _key: PhantomData<K>,
}

impl<K: IndexKey> BPlusTree<K> {
    /// Open (or register) the named index. The root page id persists in the
    /// header page directory.
    pub fn new(
        index_name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self, BTreeError> {
        let index_name = index_name.into();
        if leaf_max_size < 3 || leaf_max_size > leaf_capacity::<K>() {
            return Err(BTreeError::FanoutTooLarge(leaf_max_size));
        }
        if internal_max_size < 3 || internal_max_size > internal_capacity::<K>() {
            return Err(BTreeError::FanoutTooLarge(internal_max_size));
        }

        let page = buffer_pool.fetch_page(HEADER_PAGE_ID)?;
        let root_page_id = {
            let mut guard = page.write();
            let mut header = HeaderPage::new(&mut guard);
            match header.get_root_id(&index_name) {
                Some(id) => id,
                None => {
                    header.insert_record(&index_name, INVALID_PAGE_ID);
                    INVALID_PAGE_ID
                }
            }
        };
        buffer_pool.unpin_page(HEADER_PAGE_ID, true);

        Ok(Self {
            index_name,
            buffer_pool,
            root_page_id: Mutex::new(root_page_id),
            leaf_max_size,
            internal_max_size,
            _key: PhantomData,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self.root_page_id.lock() == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.lock()
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    /// Point lookup. Empty result when the key is absent.
    pub fn get_value(&self, key: &K, txn: &Transaction) -> Result<Vec<Rid>, BTreeError> {
        let mut ps = txn.page_set();
        let result = self.get_value_inner(key, &mut ps);
        self.release_all(&mut ps);
        result
    }

    fn get_value_inner(&self, key: &K, ps: &mut PageSet) -> Result<Vec<Rid>, BTreeError> {
        let Some(leaf_id) = self.find_leaf(Some(key), Op::Read, ps)? else {
            return Ok(Vec::new());
        };
        match self.decoded(ps, leaf_id)? {
            BTreeNode::Leaf(leaf) => Ok(leaf.lookup(key).into_iter().collect()),
            _ => Err(BTreeError::CorruptPage(leaf_id)),
        }
    }

    /// Insert a unique key. Returns false (leaving the tree untouched) when
    /// the key already exists.
    pub fn insert(&self, key: K, rid: Rid, txn: &Transaction) -> Result<bool, BTreeError> {
        let mut ps = txn.page_set();
        let result = self.insert_inner(key, rid, &mut ps);
        self.release_all(&mut ps);
        result
    }

    fn insert_inner(&self, key: K, rid: Rid, ps: &mut PageSet) -> Result<bool, BTreeError> {
        loop {
            {
                let mut root = self.root_page_id.lock();
                if *root == INVALID_PAGE_ID {
                    self.start_new_tree(&mut root, key, rid)?;
                    return Ok(true);
                }
            }
            // A concurrent remove may empty the tree between the check and
            // the descent; find_leaf reports that as None and we retry.
            let Some(leaf_id) = self.find_leaf(Some(&key), Op::Insert, ps)? else {
                continue;
            };
            return self.insert_into_leaf(leaf_id, key, rid, ps);
        }
    }

    /// Delete a key; absent keys are ignored.
    pub fn remove(&self, key: &K, txn: &Transaction) -> Result<(), BTreeError> {
        let mut ps = txn.page_set();
        let result = self.remove_inner(key, &mut ps);
        self.release_all(&mut ps);
        result
    }

    fn remove_inner(&self, key: &K, ps: &mut PageSet) -> Result<(), BTreeError> {
        let Some(leaf_id) = self.find_leaf(Some(key), Op::Delete, ps)? else {
            return Ok(());
        };
        self.remove_from_leaf(leaf_id, key, ps)
    }

    /// Iterator over the whole tree in key order.
    pub fn begin(&self) -> Result<TreeIterator<K>, BTreeError> {
        match self.find_leaf_for_iter(None)? {
            None => Ok(TreeIterator::end(self.buffer_pool.clone())),
            Some((page_id, guard)) => {
                TreeIterator::from_leaf(self.buffer_pool.clone(), page_id, guard, 0)
            }
        }
    }

    /// Iterator positioned at the first entry with key >= the probe.
    pub fn begin_at(&self, key: &K) -> Result<TreeIterator<K>, BTreeError> {
        match self.find_leaf_for_iter(Some(key))? {
            None => Ok(TreeIterator::end(self.buffer_pool.clone())),
            Some((page_id, guard)) => match BTreeNode::<K>::decode(&guard) {
                Ok(BTreeNode::Leaf(leaf)) => {
                    let index = leaf.key_index(key);
                    TreeIterator::from_leaf(self.buffer_pool.clone(), page_id, guard, index)
                }
                other => {
                    drop(guard);
                    self.buffer_pool.unpin_page(page_id, false);
                    other?;
                    Err(BTreeError::CorruptPage(page_id))
                }
            },
        }
    }

    // ---- descent ----------------------------------------------------------

    /// Crab down to the leaf covering `key` (or the leftmost leaf). On
    /// return the leaf's latch is the newest entry in the page set. None
    /// means the tree is empty.
    fn find_leaf(
        &self,
        key: Option<&K>,
        op: Op,
        ps: &mut PageSet,
    ) -> Result<Option<PageId>, BTreeError> {
        let mut current_id;
        loop {
            let root_id = *self.root_page_id.lock();
            if root_id == INVALID_PAGE_ID {
                return Ok(None);
            }
            let page = self.buffer_pool.fetch_page(root_id)?;
            let latch = match op {
                Op::Read => PageLatch::Read(page.read_arc()),
                _ => PageLatch::Write(page.write_arc()),
            };
            // Restart rule: a writer may have replaced the root while we
            // were waiting on its latch.
            if *self.root_page_id.lock() != root_id {
                drop(latch);
                self.buffer_pool.unpin_page(root_id, false);
                continue;
            }
            ps.latched.push_back(latch);
            current_id = root_id;
            break;
        }

        loop {
            let internal = match self.decoded(ps, current_id)? {
                BTreeNode::Leaf(_) => return Ok(Some(current_id)),
                BTreeNode::Internal(internal) => internal,
            };
            let child_id = match key {
                Some(k) => internal.lookup(k),
                None => internal.child_at(0),
            };
            let child_page = self.buffer_pool.fetch_page(child_id)?;
            match op {
                Op::Read => {
                    // Lock coupling: take the child before letting go of
                    // the parent.
                    let child_latch = PageLatch::Read(child_page.read_arc());
                    self.release_all(ps);
                    ps.latched.push_back(child_latch);
                }
                Op::Insert | Op::Delete => {
                    let child_latch = PageLatch::Write(child_page.write_arc());
                    let safe = match &child_latch {
                        PageLatch::Write(guard) => {
                            Self::is_safe(&BTreeNode::<K>::decode(guard)?, op)
                        }
                        PageLatch::Read(_) => unreachable!(),
                    };
                    if safe {
                        self.release_all(ps);
                    }
                    ps.latched.push_back(child_latch);
                }
            }
            current_id = child_id;
        }
    }

    /// A node is safe when the pending operation cannot propagate a
    /// structural change to its parent.
    fn is_safe(node: &BTreeNode<K>, op: Op) -> bool {
        match op {
            Op::Read => true,
            Op::Insert => match node {
                BTreeNode::Leaf(n) => (n.size() as u32) + 1 < n.max_size,
                BTreeNode::Internal(n) => (n.size() as u32) < n.max_size,
            },
            Op::Delete => node.size() > node.min_size(),
        }
    }

    /// Unlatch and unpin everything this operation holds, then delete the
    /// pages it emptied. Deletions run strictly after the latches are gone.
    fn release_all(&self, ps: &mut PageSet) {
        while let Some(latch) = ps.latched.pop_front() {
            let page_id = latch.page_id();
            let dirty = latch.is_write();
            drop(latch);
            self.buffer_pool.unpin_page(page_id, dirty);
        }
        for page_id in ps.deleted.drain(..) {
            self.buffer_pool.delete_page(page_id);
        }
    }

    /// Decode the node image of a page this operation has latched.
    fn decoded(&self, ps: &PageSet, page_id: PageId) -> Result<BTreeNode<K>, BTreeError> {
        for latch in &ps.latched {
            if latch.page_id() == page_id {
                return match latch {
                    PageLatch::Read(guard) => BTreeNode::decode(guard),
                    PageLatch::Write(guard) => BTreeNode::decode(guard),
                };
            }
        }
        Err(BTreeError::NotLatched(page_id))
    }

    /// Encode a node image back into its write-latched page.
    fn store_node(&self, ps: &mut PageSet, node: &BTreeNode<K>) -> Result<(), BTreeError> {
        for latch in ps.latched.iter_mut() {
            if latch.page_id() == node.page_id() {
                if let PageLatch::Write(guard) = latch {
                    node.encode(&mut *guard);
                    return Ok(());
                }
            }
        }
        Err(BTreeError::NotLatched(node.page_id()))
    }

    /// Update the child's on-page parent pointer, through our own latch if
    /// we hold one, otherwise with a short-lived private latch. Nobody else
    /// can reach the child while its parent is write-latched by us.
    fn adopt_child(
        &self,
        ps: &mut PageSet,
        child_id: PageId,
        parent_id: PageId,
    ) -> Result<(), BTreeError> {
        for latch in ps.latched.iter_mut() {
            if latch.page_id() == child_id {
                if let PageLatch::Write(guard) = latch {
                    btree_page::write_parent_page_id(&mut *guard, parent_id);
                    return Ok(());
                }
            }
        }
        let page = self.buffer_pool.fetch_page(child_id)?;
        {
            let mut guard = page.write();
            btree_page::write_parent_page_id(&mut guard, parent_id);
        }
        self.buffer_pool.unpin_page(child_id, true);
        Ok(())
    }

    /// Allocate a fresh page, write-latch it and add it to the page set.
    fn allocate_node_page(&self, ps: &mut PageSet) -> Result<PageId, BTreeError> {
        let (page, page_id) = self.buffer_pool.new_page()?;
        ps.latched.push_back(PageLatch::Write(page.write_arc()));
        Ok(page_id)
    }

    /// Write the current root id through to the header page directory.
    fn update_root_header(&self, root_id: PageId) -> Result<(), BTreeError> {
        let page = self.buffer_pool.fetch_page(HEADER_PAGE_ID)?;
        {
            let mut guard = page.write();
            let mut header = HeaderPage::new(&mut guard);
            if !header.update_record(&self.index_name, root_id) {
                header.insert_record(&self.index_name, root_id);
            }
        }
        self.buffer_pool.unpin_page(HEADER_PAGE_ID, true);
        Ok(())
    }

    // ---- insertion --------------------------------------------------------

    /// First insert into an empty tree; runs under the root mutex.
    fn start_new_tree(
        &self,
        root: &mut parking_lot::MutexGuard<'_, PageId>,
        key: K,
        rid: Rid,
    ) -> Result<(), BTreeError> {
        let (page, page_id) = self.buffer_pool.new_page()?;
        let mut leaf = LeafNode::new(page_id, page_id, self.leaf_max_size);
        leaf.insert(key, rid);
        {
            let mut guard = page.write();
            BTreeNode::Leaf(leaf).encode(&mut guard);
        }
        self.buffer_pool.unpin_page(page_id, true);
        **root = page_id;
        self.update_root_header(page_id)
    }

    fn insert_into_leaf(
        &self,
        leaf_id: PageId,
        key: K,
        rid: Rid,
        ps: &mut PageSet,
    ) -> Result<bool, BTreeError> {
        let BTreeNode::Leaf(mut leaf) = self.decoded(ps, leaf_id)? else {
            return Err(BTreeError::CorruptPage(leaf_id));
        };
        let Some(new_size) = leaf.insert(key, rid) else {
            return Ok(false); // duplicate key
        };

        if new_size == self.leaf_max_size as usize {
            let new_page_id = self.allocate_node_page(ps)?;
            let mut new_leaf = LeafNode::new(new_page_id, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.move_half_to(&mut new_leaf);
            new_leaf.next_page_id = leaf.next_page_id;
            leaf.next_page_id = new_page_id;
            let separator = new_leaf.entries[0].0.clone();

            let mut old_node = BTreeNode::Leaf(leaf);
            let mut new_node = BTreeNode::Leaf(new_leaf);
            self.insert_into_parent(&mut old_node, separator, &mut new_node, ps)?;
        } else {
            self.store_node(ps, &BTreeNode::Leaf(leaf))?;
        }
        Ok(true)
    }

    /// Hook a freshly split-off sibling into the parent, splitting upward
    /// as long as the parent overflows.
    fn insert_into_parent(
        &self,
        old_node: &mut BTreeNode<K>,
        key: K,
        new_node: &mut BTreeNode<K>,
        ps: &mut PageSet,
    ) -> Result<(), BTreeError> {
        if old_node.is_root() {
            let mut root = self.root_page_id.lock();
            let new_root_id = self.allocate_node_page(ps)?;
            let mut new_root =
                InternalNode::new(new_root_id, new_root_id, self.internal_max_size);
            new_root.populate_new_root(old_node.page_id(), key, new_node.page_id());
            old_node.set_parent_page_id(new_root_id);
            new_node.set_parent_page_id(new_root_id);
            self.store_node(ps, old_node)?;
            self.store_node(ps, new_node)?;
            self.store_node(ps, &BTreeNode::Internal(new_root))?;
            *root = new_root_id;
            return self.update_root_header(new_root_id);
        }

        // The parent is still write-latched: a split means the child was
        // not safe, so the descent kept every ancestor.
        let parent_id = old_node.parent_page_id();
        let BTreeNode::Internal(mut parent) = self.decoded(ps, parent_id)? else {
            return Err(BTreeError::CorruptPage(parent_id));
        };
        new_node.set_parent_page_id(parent_id);
        let new_size = parent.insert_node_after(old_node.page_id(), key, new_node.page_id());
        self.store_node(ps, old_node)?;
        self.store_node(ps, new_node)?;

        if new_size > self.internal_max_size as usize {
            let sibling_id = self.allocate_node_page(ps)?;
            let mut sibling =
                InternalNode::new(sibling_id, INVALID_PAGE_ID, self.internal_max_size);
            parent.move_half_to(&mut sibling);
            for child in sibling.children.clone() {
                self.adopt_child(ps, child, sibling_id)?;
            }
            let up_key = sibling.key_at(0).clone();
            let mut old_parent = BTreeNode::Internal(parent);
            let mut new_parent = BTreeNode::Internal(sibling);
            self.insert_into_parent(&mut old_parent, up_key, &mut new_parent, ps)
        } else {
            self.store_node(ps, &BTreeNode::Internal(parent))
        }
    }

    // ---- deletion ---------------------------------------------------------

    fn remove_from_leaf(
        &self,
        leaf_id: PageId,
        key: &K,
        ps: &mut PageSet,
    ) -> Result<(), BTreeError> {
        let BTreeNode::Leaf(mut leaf) = self.decoded(ps, leaf_id)? else {
            return Err(BTreeError::CorruptPage(leaf_id));
        };
        if !leaf.remove(key) {
            return Ok(());
        }
        let node = BTreeNode::Leaf(leaf);
        if node.size() < node.min_size() {
            self.coalesce_or_redistribute(node, ps)
        } else {
            self.store_node(ps, &node)
        }
    }

    /// Fix an underflowed node: borrow from a sibling when the two together
    /// still overflow one page, otherwise merge (preferring the left
    /// sibling as the survivor).
    fn coalesce_or_redistribute(
        &self,
        node: BTreeNode<K>,
        ps: &mut PageSet,
    ) -> Result<(), BTreeError> {
        if node.is_root() {
            return self.adjust_root(node, ps);
        }

        let parent_id = node.parent_page_id();
        let BTreeNode::Internal(mut parent) = self.decoded(ps, parent_id)? else {
            return Err(BTreeError::CorruptPage(parent_id));
        };
        let index = parent
            .value_index(node.page_id())
            .ok_or(BTreeError::CorruptPage(parent_id))?;

        let max_size = node.max_size() as usize;
        let mut left: Option<BTreeNode<K>> = None;

        if index > 0 {
            let left_id = parent.child_at(index - 1);
            self.latch_sibling(ps, left_id)?;
            let left_node = self.decoded(ps, left_id)?;
            if left_node.size() + node.size() >= max_size {
                return self.redistribute_from_left(left_node, node, parent, index, ps);
            }
            left = Some(left_node);
        }

        if index + 1 < parent.size() {
            let right_id = parent.child_at(index + 1);
            self.latch_sibling(ps, right_id)?;
            let right_node = self.decoded(ps, right_id)?;
            if right_node.size() + node.size() >= max_size {
                return self.redistribute_from_right(node, right_node, parent, index, ps);
            }
            if left.is_none() {
                // No left sibling: absorb the right one instead, which
                // keeps the leaf chain intact without a backward link.
                let parent = self.merge(node, right_node, parent, index + 1, ps)?;
                return self.finish_parent(parent, ps);
            }
        }

        let left = left.ok_or(BTreeError::CorruptPage(parent_id))?;
        let parent = self.merge(left, node, parent, index, ps)?;
        self.finish_parent(parent, ps)
    }

    fn latch_sibling(&self, ps: &mut PageSet, page_id: PageId) -> Result<(), BTreeError> {
        let page = self.buffer_pool.fetch_page(page_id)?;
        ps.latched.push_back(PageLatch::Write(page.write_arc()));
        Ok(())
    }

    /// After a merge removed a separator, either persist the parent or keep
    /// fixing underflows upward.
    fn finish_parent(&self, parent: InternalNode<K>, ps: &mut PageSet) -> Result<(), BTreeError> {
        let node = BTreeNode::Internal(parent);
        if node.size() < node.min_size() {
            self.coalesce_or_redistribute(node, ps)
        } else {
            self.store_node(ps, &node)
        }
    }

    /// Move the left sibling's last entry into the node's front and rewrite
    /// the separator.
    fn redistribute_from_left(
        &self,
        mut left: BTreeNode<K>,
        mut node: BTreeNode<K>,
        mut parent: InternalNode<K>,
        index: usize,
        ps: &mut PageSet,
    ) -> Result<(), BTreeError> {
        match (&mut left, &mut node) {
            (BTreeNode::Leaf(l), BTreeNode::Leaf(n)) => {
                let entry = l.entries.pop().ok_or(BTreeError::CorruptPage(l.page_id))?;
                n.entries.insert(0, entry);
                parent.set_key_at(index, n.entries[0].0.clone());
            }
            (BTreeNode::Internal(l), BTreeNode::Internal(n)) => {
                let donated_child = l.children.pop().ok_or(BTreeError::CorruptPage(l.page_id))?;
                let donated_key = l.keys.pop().ok_or(BTreeError::CorruptPage(l.page_id))?;
                // the old separator drops down in front of the node's keys,
                // the donor's last key replaces it in the parent
                let separator = parent.key_at(index).clone();
                n.children.insert(0, donated_child);
                n.keys.insert(1, separator);
                n.keys[0] = K::zeroed();
                parent.set_key_at(index, donated_key);
                let node_id = n.page_id;
                self.adopt_child(ps, donated_child, node_id)?;
            }
            _ => return Err(BTreeError::CorruptPage(node.page_id())),
        }
        self.store_node(ps, &left)?;
        self.store_node(ps, &node)?;
        self.store_node(ps, &BTreeNode::Internal(parent))
    }

    /// Move the right sibling's first entry onto the node's end and rewrite
    /// the separator.
    fn redistribute_from_right(
        &self,
        mut node: BTreeNode<K>,
        mut right: BTreeNode<K>,
        mut parent: InternalNode<K>,
        index: usize,
        ps: &mut PageSet,
    ) -> Result<(), BTreeError> {
        match (&mut node, &mut right) {
            (BTreeNode::Leaf(n), BTreeNode::Leaf(r)) => {
                if r.entries.is_empty() {
                    return Err(BTreeError::CorruptPage(r.page_id));
                }
                let entry = r.entries.remove(0);
                n.entries.push(entry);
                parent.set_key_at(index + 1, r.entries[0].0.clone());
            }
            (BTreeNode::Internal(n), BTreeNode::Internal(r)) => {
                if r.keys.len() < 2 {
                    return Err(BTreeError::CorruptPage(r.page_id));
                }
                let separator = parent.key_at(index + 1).clone();
                let up_key = r.keys[1].clone();
                let moved_child = r.children.remove(0);
                r.keys.remove(0);
                r.keys[0] = K::zeroed();
                n.keys.push(separator);
                n.children.push(moved_child);
                parent.set_key_at(index + 1, up_key);
                let node_id = n.page_id;
                self.adopt_child(ps, moved_child, node_id)?;
            }
            _ => return Err(BTreeError::CorruptPage(node.page_id())),
        }
        self.store_node(ps, &node)?;
        self.store_node(ps, &right)?;
        self.store_node(ps, &BTreeNode::Internal(parent))
    }

    /// Fold `victim` into `target` (its left neighbor under the same
    /// parent), pull out the separator and schedule the emptied page for
    /// deletion. Returns the updated parent for the caller to finish.
    fn merge(
        &self,
        mut target: BTreeNode<K>,
        mut victim: BTreeNode<K>,
        mut parent: InternalNode<K>,
        victim_index: usize,
        ps: &mut PageSet,
    ) -> Result<InternalNode<K>, BTreeError> {
        match (&mut target, &mut victim) {
            (BTreeNode::Leaf(t), BTreeNode::Leaf(v)) => {
                t.entries.append(&mut v.entries);
                t.next_page_id = v.next_page_id;
            }
            (BTreeNode::Internal(t), BTreeNode::Internal(v)) => {
                let separator = parent.key_at(victim_index).clone();
                let target_id = t.page_id;
                t.keys.push(separator);
                t.keys.extend(v.keys.drain(..).skip(1));
                let moved = std::mem::take(&mut v.children);
                for &child in &moved {
                    self.adopt_child(ps, child, target_id)?;
                }
                t.children.extend(moved);
            }
            _ => return Err(BTreeError::CorruptPage(victim.page_id())),
        }
        self.store_node(ps, &target)?;
        ps.deleted.push(victim.page_id());
        parent.remove(victim_index);
        Ok(parent)
    }

    /// The root is exempt from the minimum-size rule, but two shapes
    /// collapse it: an empty leaf root empties the tree, and an internal
    /// root with a single child hands the crown to that child.
    fn adjust_root(&self, node: BTreeNode<K>, ps: &mut PageSet) -> Result<(), BTreeError> {
        match node {
            BTreeNode::Leaf(leaf) => {
                if leaf.entries.is_empty() {
                    let mut root = self.root_page_id.lock();
                    ps.deleted.push(leaf.page_id);
                    *root = INVALID_PAGE_ID;
                    self.update_root_header(INVALID_PAGE_ID)
                } else {
                    self.store_node(ps, &BTreeNode::Leaf(leaf))
                }
            }
            BTreeNode::Internal(internal) => {
                if internal.size() == 1 {
                    let child_id = internal.child_at(0);
                    let mut root = self.root_page_id.lock();
                    self.adopt_child(ps, child_id, child_id)?;
                    ps.deleted.push(internal.page_id);
                    *root = child_id;
                    self.update_root_header(child_id)
                } else {
                    self.store_node(ps, &BTreeNode::Internal(internal))
                }
            }
        }
    }

    // ---- iterator support -------------------------------------------------

    /// Latch-coupled read descent that hands the leaf's read guard to the
    /// iterator instead of a transaction page set.
    fn find_leaf_for_iter(
        &self,
        key: Option<&K>,
    ) -> Result<Option<(PageId, crate::storage::page::page::PageReadGuard)>, BTreeError> {
        loop {
            let root_id = *self.root_page_id.lock();
            if root_id == INVALID_PAGE_ID {
                return Ok(None);
            }
            let page = self.buffer_pool.fetch_page(root_id)?;
            let guard = page.read_arc();
            if *self.root_page_id.lock() != root_id {
                drop(guard);
                self.buffer_pool.unpin_page(root_id, false);
                continue;
            }

            let mut current_id = root_id;
            let mut current_guard = guard;
            loop {
                let node = match BTreeNode::<K>::decode(&current_guard) {
                    Ok(node) => node,
                    Err(e) => {
                        drop(current_guard);
                        self.buffer_pool.unpin_page(current_id, false);
                        return Err(e);
                    }
                };
                let internal = match node {
                    BTreeNode::Leaf(_) => return Ok(Some((current_id, current_guard))),
                    BTreeNode::Internal(internal) => internal,
                };
                let child_id = match key {
                    Some(k) => internal.lookup(k),
                    None => internal.child_at(0),
                };
                let child_page = match self.buffer_pool.fetch_page(child_id) {
                    Ok(page) => page,
                    Err(e) => {
                        drop(current_guard);
                        self.buffer_pool.unpin_page(current_id, false);
                        return Err(e.into());
                    }
                };
                let child_guard = child_page.read_arc();
                drop(current_guard);
                self.buffer_pool.unpin_page(current_id, false);
                current_id = child_id;
                current_guard = child_guard;
            }
        }
    }
}
