use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::catalog::schema::{DataType, Schema};
use crate::index::btree::{BPlusTree, BTreeError};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::table::table_heap::{HeapError, TableHeap};
use crate::storage::table::tuple::{Tuple, TupleError, Value};
use crate::transaction::transaction::Transaction;

pub type TableOid = u32;
pub type IndexOid = u32;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("table {0} already exists")]
    TableExists(String),

    #[error("table {0} does not exist")]
    TableNotFound(String),

    #[error("index {0} already exists on table {1}")]
    IndexExists(String, String),

    #[error("index {0} does not exist")]
    IndexNotFound(String),

    #[error("index key must be a single integer column")]
    BadIndexKey,

    #[error("heap error: {0}")]
    Heap(#[from] HeapError),

    #[error("btree error: {0}")]
    BTree(#[from] BTreeError),

    #[error("tuple error: {0}")]
    Tuple(#[from] TupleError),
}

pub struct TableInfo {
    pub name: String,
    pub oid: TableOid,
    pub schema: Schema,
    pub table: Arc<TableHeap>,
}

pub struct IndexInfo {
    pub name: String,
    pub oid: IndexOid,
    pub table_name: String,
    pub key_schema: Schema,
    pub key_attrs: Vec<usize>,
    pub index: Arc<BPlusTree<i64>>,
}

impl IndexInfo {
    /// Build the probe key for a row of the indexed table.
    pub fn key_for(&self, tuple: &Tuple, table_schema: &Schema) -> Result<i64, CatalogError> {
        let values = tuple.key_from_tuple(table_schema, &self.key_attrs)?;
        match values.as_slice() {
            [Value::Integer(key)] => Ok(*key),
            _ => Err(CatalogError::BadIndexKey),
        }
    }
}

/// Maps table and index names to their runtime handles. One per database
/// instance, shared behind a lock.
pub struct Catalog {
    buffer_pool: Arc<BufferPoolManager>,
    next_table_oid: AtomicU32,
    next_index_oid: AtomicU32,
    tables: HashMap<TableOid, Arc<TableInfo>>,
    table_names: HashMap<String, TableOid>,
    indexes: HashMap<IndexOid, Arc<IndexInfo>>,
    index_names: HashMap<(String, String), IndexOid>,
}

impl Catalog {
    pub fn new(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            buffer_pool,
            next_table_oid: AtomicU32::new(0),
            next_index_oid: AtomicU32::new(0),
            tables: HashMap::new(),
            table_names: HashMap::new(),
            indexes: HashMap::new(),
            index_names: HashMap::new(),
        }
    }

    pub fn create_table(
        &mut self,
        name: impl Into<String>,
        schema: Schema,
    ) -> Result<Arc<TableInfo>, CatalogError> {
        let name = name.into();
        if self.table_names.contains_key(&name) {
            return Err(CatalogError::TableExists(name));
        }
        let oid = self.next_table_oid.fetch_add(1, Ordering::SeqCst);
        let table = Arc::new(TableHeap::new(self.buffer_pool.clone())?);
        let info = Arc::new(TableInfo {
            name: name.clone(),
            oid,
            schema,
            table,
        });
        self.tables.insert(oid, info.clone());
        self.table_names.insert(name, oid);
        Ok(info)
    }

    pub fn get_table(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.tables.get(&oid).cloned()
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.table_names.get(name).and_then(|oid| self.get_table(*oid))
    }

    /// Create a B+tree index over one integer column and backfill it from
    /// the table's existing rows.
    pub fn create_index(
        &mut self,
        txn: &Arc<Transaction>,
        index_name: impl Into<String>,
        table_name: &str,
        key_attrs: Vec<usize>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Arc<IndexInfo>, CatalogError> {
        let index_name = index_name.into();
        let table_info = self
            .get_table_by_name(table_name)
            .ok_or_else(|| CatalogError::TableNotFound(table_name.to_string()))?;

        let name_key = (table_name.to_string(), index_name.clone());
        if self.index_names.contains_key(&name_key) {
            return Err(CatalogError::IndexExists(index_name, name_key.0));
        }

        let [key_attr] = key_attrs.as_slice() else {
            return Err(CatalogError::BadIndexKey);
        };
        let key_column = table_info
            .schema
            .column(*key_attr)
            .ok_or(CatalogError::BadIndexKey)?;
        if key_column.data_type != DataType::Integer {
            return Err(CatalogError::BadIndexKey);
        }
        let key_schema = Schema::new(vec![key_column.clone()]);

        let oid = self.next_index_oid.fetch_add(1, Ordering::SeqCst);
        let index = Arc::new(BPlusTree::<i64>::new(
            index_name.clone(),
            self.buffer_pool.clone(),
            leaf_max_size,
            internal_max_size,
        )?);

        let info = Arc::new(IndexInfo {
            name: index_name,
            oid,
            table_name: table_name.to_string(),
            key_schema,
            key_attrs,
            index: index.clone(),
        });

        // backfill from whatever already lives in the heap
        let mut iter = table_info.table.iter();
        while let Some((tuple, rid)) = iter.next()? {
            let key = info.key_for(&tuple, &table_info.schema)?;
            index.insert(key, rid, txn)?;
        }

        self.indexes.insert(oid, info.clone());
        self.index_names.insert(name_key, oid);
        Ok(info)
    }

    pub fn get_index(&self, oid: IndexOid) -> Option<Arc<IndexInfo>> {
        self.indexes.get(&oid).cloned()
    }

    pub fn get_index_by_name(&self, table_name: &str, index_name: &str) -> Option<Arc<IndexInfo>> {
        self.index_names
            .get(&(table_name.to_string(), index_name.to_string()))
            .and_then(|oid| self.get_index(*oid))
    }

    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        self.indexes
            .values()
            .filter(|info| info.table_name == table_name)
            .cloned()
            .collect()
    }
}
