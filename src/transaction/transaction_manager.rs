use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{
    IsolationLevel, Transaction, TransactionError, TransactionState, WriteType,
};

/// Creates transactions and drives their commit/abort protocols. Rollback
/// replays the recorded write sets in reverse; both outcomes end with the
/// lock manager dropping whatever the transaction still holds.
pub struct TransactionManager {
    next_txn_id: AtomicU32,
    lock_manager: Arc<LockManager>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            lock_manager,
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id, isolation_level));
        self.lock_manager.register_transaction(&txn);
        txn
    }

    /// Make the transaction's effects final: marked deletes become real,
    /// locks are released, state moves to COMMITTED.
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        for record in txn.take_table_writes() {
            if record.write_type == WriteType::Delete {
                record
                    .table
                    .apply_delete(record.rid)
                    .map_err(|e| TransactionError::Rollback(e.to_string()))?;
            }
        }
        txn.take_index_writes();

        txn.set_state(TransactionState::Committed);
        self.lock_manager.release_all(txn);
        self.lock_manager.deregister_transaction(txn.id());
        Ok(())
    }

    /// Undo everything the transaction wrote, newest first, then release
    /// its locks and mark it ABORTED.
    pub fn abort(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        let mut table_writes = txn.take_table_writes();
        table_writes.reverse();
        for record in table_writes {
            let result = match record.write_type {
                WriteType::Insert => record.table.apply_delete(record.rid).map(|_| ()),
                WriteType::Delete => record.table.rollback_delete(record.rid).map(|_| ()),
                WriteType::Update => match &record.old_tuple {
                    Some(old) => record.table.restore_tuple(old, record.rid).map(|_| ()),
                    None => Ok(()),
                },
            };
            result.map_err(|e| TransactionError::Rollback(e.to_string()))?;
        }

        let mut index_writes = txn.take_index_writes();
        index_writes.reverse();
        for record in index_writes {
            let result = match record.write_type {
                WriteType::Insert => record.index.remove(&record.key, txn).map(|_| ()),
                WriteType::Delete => record.index.insert(record.key, record.rid, txn).map(|_| ()),
                WriteType::Update => record.index.remove(&record.key, txn).and_then(|_| {
                    match record.old_key {
                        Some(old_key) => {
                            record.index.insert(old_key, record.rid, txn).map(|_| ())
                        }
                        None => Ok(()),
                    }
                }),
            };
            result.map_err(|e| TransactionError::Rollback(e.to_string()))?;
        }

        txn.set_state(TransactionState::Aborted);
        self.lock_manager.release_all(txn);
        self.lock_manager.deregister_transaction(txn.id());
        Ok(())
    }
}
