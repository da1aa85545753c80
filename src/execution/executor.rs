use thiserror::Error;

use crate::catalog::catalog::CatalogError;
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::index::btree::BTreeError;
use crate::storage::buffer::BufferPoolError;
use crate::storage::table::table_heap::HeapError;
use crate::storage::table::tuple::{Tuple, TupleError};
use crate::transaction::transaction::TransactionError;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("heap error: {0}")]
    Heap(#[from] HeapError),

    #[error("btree error: {0}")]
    BTree(#[from] BTreeError),

    #[error("buffer pool error: {0}")]
    Buffer(#[from] BufferPoolError),

    #[error("tuple error: {0}")]
    Tuple(#[from] TupleError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("table {0} not found")]
    TableNotFound(String),

    #[error("index {0} not found")]
    IndexNotFound(String),

    #[error("column {0} not found")]
    ColumnNotFound(String),

    #[error("type error: {0}")]
    Type(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Volcano operator interface: `init` rewinds, `next` pulls one row.
/// A failed `next` carries the abort upward; the transaction state has
/// already been flipped by whoever raised it.
pub trait Executor {
    fn init(&mut self) -> ExecutionResult<()>;
    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>>;
    fn output_schema(&self) -> &Schema;
}

pub type BoxedExecutor = Box<dyn Executor + Send>;
