use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::context::ExecutorContext;
use crate::execution::executor::{BoxedExecutor, ExecutionError, ExecutionResult, Executor};
use crate::storage::table::tuple::{Tuple, Value};
use crate::transaction::transaction::{IndexWriteRecord, WriteType};

/// How one column changes under an update.
#[derive(Debug, Clone)]
pub enum UpdateAction {
    Set(Value),
    Add(i64),
}

/// Rewrites the child's rows in place under an exclusive lock, recording
/// pre-images and swapping affected index entries. Emits each updated row.
pub struct UpdateExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    update_attrs: HashMap<usize, UpdateAction>,
    child: BoxedExecutor,
}

impl UpdateExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        table_info: Arc<TableInfo>,
        update_attrs: HashMap<usize, UpdateAction>,
        child: BoxedExecutor,
    ) -> Self {
        Self {
            ctx,
            table_info,
            indexes: Vec::new(),
            update_attrs,
            child,
        }
    }

    fn updated_tuple(&self, old: &Tuple) -> ExecutionResult<Tuple> {
        let mut values = old.values(&self.table_info.schema)?;
        for (&col, action) in &self.update_attrs {
            let slot = values
                .get_mut(col)
                .ok_or_else(|| ExecutionError::ColumnNotFound(format!("#{}", col)))?;
            match action {
                UpdateAction::Set(value) => *slot = value.clone(),
                UpdateAction::Add(delta) => match slot {
                    Value::Integer(v) => *v += delta,
                    other => {
                        return Err(ExecutionError::Type(format!(
                            "cannot add to non-integer value {}",
                            other
                        )))
                    }
                },
            }
        }
        Ok(Tuple::from_values(&values)?)
    }
}

impl Executor for UpdateExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.indexes = self
            .ctx
            .catalog
            .read()
            .get_table_indexes(&self.table_info.name);
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some((_, rid)) = self.child.next()? else {
            return Ok(None);
        };
        self.ctx.lock_row_exclusive(rid)?;

        let Some(old_tuple) = self.table_info.table.get_tuple(rid)? else {
            return self.next();
        };
        let mut new_tuple = self.updated_tuple(&old_tuple)?;
        new_tuple.rid = rid;
        self.table_info
            .table
            .update_tuple(&new_tuple, rid, &self.ctx.txn)?;

        for index_info in &self.indexes {
            let old_key = index_info.key_for(&old_tuple, &self.table_info.schema)?;
            let new_key = index_info.key_for(&new_tuple, &self.table_info.schema)?;
            index_info.index.remove(&old_key, &self.ctx.txn)?;
            index_info.index.insert(new_key, rid, &self.ctx.txn)?;
            self.ctx.txn.append_index_write(IndexWriteRecord {
                rid,
                write_type: WriteType::Update,
                key: new_key,
                old_key: Some(old_key),
                index: index_info.index.clone(),
            });
        }
        Ok(Some((new_tuple, rid)))
    }

    fn output_schema(&self) -> &Schema {
        &self.table_info.schema
    }
}
