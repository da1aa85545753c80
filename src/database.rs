use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::common::config::DbConfig;
use crate::execution::ExecutorContext;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::disk::{DiskManager, DiskManagerError};
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{IsolationLevel, Transaction};
use crate::transaction::transaction_manager::TransactionManager;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("disk manager error: {0}")]
    Disk(#[from] DiskManagerError),
}

/// One database instance: the engine singletons wired together from a
/// config. Everything hangs off the buffer pool; the deadlock detector
/// starts with the lock manager and stops when the instance drops.
pub struct Database {
    config: DbConfig,
    pub buffer_pool: Arc<BufferPoolManager>,
    pub lock_manager: Arc<LockManager>,
    pub txn_manager: Arc<TransactionManager>,
    pub catalog: Arc<RwLock<Catalog>>,
}

impl Database {
    pub fn open(db_path: impl AsRef<Path>, config: DbConfig) -> Result<Self, DatabaseError> {
        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        let buffer_pool = Arc::new(BufferPoolManager::new(config.pool_size, disk_manager));
        let lock_manager = Arc::new(LockManager::new(config.cycle_detection_interval));
        let txn_manager = Arc::new(TransactionManager::new(lock_manager.clone()));
        let catalog = Arc::new(RwLock::new(Catalog::new(buffer_pool.clone())));
        Ok(Self {
            config,
            buffer_pool,
            lock_manager,
            txn_manager,
            catalog,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        self.txn_manager.begin(isolation_level)
    }

    /// Context for running an operator tree under the given transaction.
    pub fn context(&self, txn: Arc<Transaction>) -> Arc<ExecutorContext> {
        Arc::new(ExecutorContext::new(
            txn,
            self.catalog.clone(),
            self.buffer_pool.clone(),
            self.lock_manager.clone(),
            self.txn_manager.clone(),
        ))
    }

    /// Write every resident dirty page back to disk.
    pub fn flush(&self) {
        self.buffer_pool.flush_all_pages();
    }
}
