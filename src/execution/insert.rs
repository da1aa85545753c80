use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::context::ExecutorContext;
use crate::execution::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::storage::table::tuple::{Tuple, Value};
use crate::transaction::transaction::{IndexWriteRecord, WriteType};

/// Inserts rows into a table and keeps every index on it in step. Two
/// feeding modes: raw value lists, or a child operator. Produces no rows;
/// all the work happens on the first `next` call.
pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    raw_values: Vec<Vec<Value>>,
    child: Option<BoxedExecutor>,
    done: bool,
}

impl InsertExecutor {
    pub fn from_raw_values(
        ctx: Arc<ExecutorContext>,
        table_info: Arc<TableInfo>,
        raw_values: Vec<Vec<Value>>,
    ) -> Self {
        Self {
            ctx,
            table_info,
            indexes: Vec::new(),
            raw_values,
            child: None,
            done: false,
        }
    }

    pub fn from_child(
        ctx: Arc<ExecutorContext>,
        table_info: Arc<TableInfo>,
        child: BoxedExecutor,
    ) -> Self {
        Self {
            ctx,
            table_info,
            indexes: Vec::new(),
            raw_values: Vec::new(),
            child: Some(child),
            done: false,
        }
    }

    fn insert_one(
        ctx: &ExecutorContext,
        table_info: &TableInfo,
        indexes: &[Arc<IndexInfo>],
        mut tuple: Tuple,
    ) -> ExecutionResult<()> {
        let txn = &ctx.txn;
        let rid = table_info.table.insert_tuple(&mut tuple, txn)?;
        for index_info in indexes {
            let key = index_info.key_for(&tuple, &table_info.schema)?;
            index_info.index.insert(key, rid, txn)?;
            txn.append_index_write(IndexWriteRecord {
                rid,
                write_type: WriteType::Insert,
                key,
                old_key: None,
                index: index_info.index.clone(),
            });
        }
        Ok(())
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        if let Some(child) = self.child.as_mut() {
            child.init()?;
        }
        self.indexes = self
            .ctx
            .catalog
            .read()
            .get_table_indexes(&self.table_info.name);
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        if let Some(child) = self.child.as_mut() {
            while let Some((tuple, _)) = child.next()? {
                Self::insert_one(&self.ctx, &self.table_info, &self.indexes, tuple)?;
            }
        } else {
            for values in std::mem::take(&mut self.raw_values) {
                let tuple = Tuple::from_values(&values)?;
                Self::insert_one(&self.ctx, &self.table_info, &self.indexes, tuple)?;
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.table_info.schema
    }
}
