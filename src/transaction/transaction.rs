use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

use crate::common::types::{PageId, Rid, TxnId};
use crate::index::btree::BPlusTree;
use crate::storage::page::page::PageLatch;
use crate::storage::table::table_heap::TableHeap;
use crate::storage::table::tuple::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// Two-phase locking state machine. GROWING acquires, SHRINKING releases;
/// the first unlock under REPEATABLE_READ flips the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction {0} requested a lock while shrinking")]
    LockOnShrinking(TxnId),

    #[error("transaction {0} aborted as a deadlock victim")]
    Deadlock(TxnId),

    #[error("transaction {0} upgraded a lock it does not hold")]
    UpgradeWithoutLock(TxnId),

    #[error("transaction {0} is not active")]
    NotActive(TxnId),

    #[error("rollback failed: {0}")]
    Rollback(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    Insert,
    Delete,
    Update,
}

/// Undo information for one table heap mutation.
pub struct TableWriteRecord {
    pub rid: Rid,
    pub write_type: WriteType,
    pub old_tuple: Option<Tuple>,
    pub table: Arc<TableHeap>,
}

/// Undo information for one index mutation.
pub struct IndexWriteRecord {
    pub rid: Rid,
    pub write_type: WriteType,
    pub key: i64,
    pub old_key: Option<i64>,
    pub index: Arc<BPlusTree<i64>>,
}

/// Pages latched (and scheduled for deletion) by an in-flight B+tree
/// operation. Drained at the crabbing release points.
#[derive(Default)]
pub struct PageSet {
    pub latched: VecDeque<PageLatch>,
    pub deleted: Vec<PageId>,
}

/// An active transaction. Shared across threads (the deadlock detector may
/// flip its state), so every mutable field sits behind its own lock.
pub struct Transaction {
    id: TxnId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,
    shared_lock_set: Mutex<HashSet<Rid>>,
    exclusive_lock_set: Mutex<HashSet<Rid>>,
    table_write_set: Mutex<Vec<TableWriteRecord>>,
    index_write_set: Mutex<Vec<IndexWriteRecord>>,
    page_set: Mutex<PageSet>,
}

impl Transaction {
    pub fn new(id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
            table_write_set: Mutex::new(Vec::new()),
            index_write_set: Mutex::new(Vec::new()),
            page_set: Mutex::new(PageSet::default()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    pub fn is_shared_locked(&self, rid: &Rid) -> bool {
        self.shared_lock_set.lock().contains(rid)
    }

    pub fn is_exclusive_locked(&self, rid: &Rid) -> bool {
        self.exclusive_lock_set.lock().contains(rid)
    }

    pub fn shared_lock_set(&self) -> MutexGuard<'_, HashSet<Rid>> {
        self.shared_lock_set.lock()
    }

    pub fn exclusive_lock_set(&self) -> MutexGuard<'_, HashSet<Rid>> {
        self.exclusive_lock_set.lock()
    }

    pub fn append_table_write(&self, record: TableWriteRecord) {
        self.table_write_set.lock().push(record);
    }

    pub fn append_index_write(&self, record: IndexWriteRecord) {
        self.index_write_set.lock().push(record);
    }

    pub fn take_table_writes(&self) -> Vec<TableWriteRecord> {
        std::mem::take(&mut *self.table_write_set.lock())
    }

    pub fn take_index_writes(&self) -> Vec<IndexWriteRecord> {
        std::mem::take(&mut *self.index_write_set.lock())
    }

    /// Scratch latch/deletion sets for a B+tree traversal. The guard is
    /// held for the duration of one tree operation.
    pub fn page_set(&self) -> MutexGuard<'_, PageSet> {
        self.page_set.lock()
    }
}
