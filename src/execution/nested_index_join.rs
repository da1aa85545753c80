use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::context::ExecutorContext;
use crate::execution::executor::{
    ExecutionError, ExecutionResult, Executor, BoxedExecutor,
};
use crate::storage::table::tuple::{Tuple, Value};

/// Index-accelerated join: for each outer row, the named join column is
/// turned into a probe key against the inner table's index, and every
/// matching inner row is concatenated onto the outer one.
pub struct NestedIndexJoinExecutor {
    ctx: Arc<ExecutorContext>,
    child: BoxedExecutor,
    inner_table: Arc<TableInfo>,
    inner_index: Arc<IndexInfo>,
    join_column: String,
    join_col_index: usize,
    output_schema: Schema,
    pending: Vec<Tuple>,
}

impl NestedIndexJoinExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        child: BoxedExecutor,
        inner_table: Arc<TableInfo>,
        inner_index: Arc<IndexInfo>,
        join_column: impl Into<String>,
    ) -> Self {
        let output_schema = child.output_schema().concat(&inner_table.schema);
        Self {
            ctx,
            child,
            inner_table,
            inner_index,
            join_column: join_column.into(),
            join_col_index: 0,
            output_schema,
            pending: Vec::new(),
        }
    }
}

impl Executor for NestedIndexJoinExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.join_col_index = self
            .child
            .output_schema()
            .column_index(&self.join_column)
            .ok_or_else(|| ExecutionError::ColumnNotFound(self.join_column.clone()))?;
        self.pending.clear();
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        loop {
            if let Some(row) = self.pending.pop() {
                return Ok(Some((row, Rid::invalid())));
            }

            let Some((outer_tuple, _)) = self.child.next()? else {
                return Ok(None);
            };
            let probe_key = match outer_tuple.value(self.child.output_schema(), self.join_col_index)? {
                Value::Integer(key) => key,
                other => {
                    return Err(ExecutionError::Type(format!(
                        "join key {} is not an integer",
                        other
                    )))
                }
            };

            let outer_values = outer_tuple.values(self.child.output_schema())?;
            for rid in self.inner_index.index.get_value(&probe_key, &self.ctx.txn)? {
                let Some(inner_tuple) = self.inner_table.table.get_tuple(rid)? else {
                    continue;
                };
                let mut values = outer_values.clone();
                values.extend(inner_tuple.values(&self.inner_table.schema)?);
                self.pending.push(Tuple::from_values(&values)?);
            }
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
