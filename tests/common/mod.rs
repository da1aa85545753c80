use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use tempfile::NamedTempFile;

use karstdb::catalog::schema::{Column, DataType, Schema};
use karstdb::database::Database;
use karstdb::execution::ExecutorContext;
use karstdb::storage::buffer::BufferPoolManager;
use karstdb::storage::disk::DiskManager;
use karstdb::transaction::{IsolationLevel, Transaction};
use karstdb::DbConfig;

static LOGGER: Lazy<()> = Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

// Create a buffer pool manager backed by a temporary database file
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolManager>, NamedTempFile)> {
    Lazy::force(&LOGGER);
    let file = NamedTempFile::new()?;
    let disk_manager = Arc::new(DiskManager::new(file.path())?);
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, disk_manager));
    Ok((buffer_pool, file))
}

/// A full engine instance over a temporary file.
#[allow(dead_code)]
pub struct TestDb {
    pub db: Database,
    _file: NamedTempFile,
}

impl std::ops::Deref for TestDb {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

#[allow(dead_code)]
impl TestDb {
    pub fn new(pool_size: usize) -> Result<Self> {
        Self::with_detection_interval(pool_size, Duration::from_millis(50))
    }

    pub fn with_detection_interval(pool_size: usize, interval: Duration) -> Result<Self> {
        Lazy::force(&LOGGER);
        let file = NamedTempFile::new()?;
        let config = DbConfig {
            pool_size,
            cycle_detection_interval: interval,
            ..DbConfig::default()
        };
        let db = Database::open(file.path(), config)?;
        Ok(Self { db, _file: file })
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        self.db.begin(isolation_level)
    }

    pub fn context(&self, txn: Arc<Transaction>) -> Arc<ExecutorContext> {
        self.db.context(txn)
    }
}

/// id INTEGER, name TEXT, balance INTEGER
#[allow(dead_code)]
pub fn accounts_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", DataType::Integer),
        Column::new("name", DataType::Text),
        Column::new("balance", DataType::Integer),
    ])
}
