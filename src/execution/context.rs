use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::common::types::Rid;
use crate::execution::executor::ExecutionResult;
use crate::storage::buffer::BufferPoolManager;
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{IsolationLevel, Transaction};
use crate::transaction::transaction_manager::TransactionManager;

/// Everything an operator needs: the running transaction plus the engine
/// singletons.
pub struct ExecutorContext {
    pub txn: Arc<Transaction>,
    pub catalog: Arc<RwLock<Catalog>>,
    pub buffer_pool: Arc<BufferPoolManager>,
    pub lock_manager: Arc<LockManager>,
    pub txn_manager: Arc<TransactionManager>,
}

impl ExecutorContext {
    pub fn new(
        txn: Arc<Transaction>,
        catalog: Arc<RwLock<Catalog>>,
        buffer_pool: Arc<BufferPoolManager>,
        lock_manager: Arc<LockManager>,
        txn_manager: Arc<TransactionManager>,
    ) -> Self {
        Self {
            txn,
            catalog,
            buffer_pool,
            lock_manager,
            txn_manager,
        }
    }

    /// Reader shim: take S before touching a row, except under
    /// READ_UNCOMMITTED. Returns whether a lock was newly acquired (so a
    /// READ_COMMITTED caller knows to drop it again).
    pub fn lock_row_shared(&self, rid: Rid) -> ExecutionResult<bool> {
        if self.txn.isolation_level() == IsolationLevel::ReadUncommitted {
            return Ok(false);
        }
        if self.txn.is_shared_locked(&rid) || self.txn.is_exclusive_locked(&rid) {
            return Ok(false);
        }
        self.lock_manager.lock_shared(&self.txn, rid)?;
        Ok(true)
    }

    /// Reader shim, tail half: READ_COMMITTED gives S locks back as soon as
    /// the row has been produced.
    pub fn unlock_row_after_read(&self, rid: Rid, acquired: bool) {
        if acquired && self.txn.isolation_level() == IsolationLevel::ReadCommitted {
            self.lock_manager.unlock(&self.txn, rid);
        }
    }

    /// Writer shim: end up holding X on the row, upgrading a held S lock.
    pub fn lock_row_exclusive(&self, rid: Rid) -> ExecutionResult<()> {
        if self.txn.is_exclusive_locked(&rid) {
            return Ok(());
        }
        if self.txn.is_shared_locked(&rid) {
            self.lock_manager.lock_upgrade(&self.txn, rid)?;
        } else {
            self.lock_manager.lock_exclusive(&self.txn, rid)?;
        }
        Ok(())
    }
}
