use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::context::ExecutorContext;
use crate::execution::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::storage::table::tuple::Tuple;
use crate::transaction::transaction::{IndexWriteRecord, WriteType};

/// Marks the child's rows deleted under an exclusive lock (upgrading a
/// held shared lock) and retracts their index entries. Produces no rows.
pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    child: BoxedExecutor,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        table_info: Arc<TableInfo>,
        child: BoxedExecutor,
    ) -> Self {
        Self {
            ctx,
            table_info,
            indexes: Vec::new(),
            child,
            done: false,
        }
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
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

        while let Some((_, rid)) = self.child.next()? {
            self.ctx.lock_row_exclusive(rid)?;

            // re-read through the heap: the child may have projected
            // columns away, the index maintenance needs the full row
            let Some(tuple) = self.table_info.table.get_tuple(rid)? else {
                continue;
            };
            self.table_info.table.mark_delete(rid, &self.ctx.txn)?;

            for index_info in &self.indexes {
                let key = index_info.key_for(&tuple, &self.table_info.schema)?;
                index_info.index.remove(&key, &self.ctx.txn)?;
                self.ctx.txn.append_index_write(IndexWriteRecord {
                    rid,
                    write_type: WriteType::Delete,
                    key,
                    old_key: None,
                    index: index_info.index.clone(),
                });
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.table_info.schema
    }
}
