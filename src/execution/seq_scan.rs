use std::sync::Arc;

use crate::catalog::catalog::TableInfo;
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::context::ExecutorContext;
use crate::execution::executor::{ExecutionResult, Executor};
use crate::execution::expression::Expression;
use crate::storage::table::table_iterator::TableIterator;
use crate::storage::table::tuple::Tuple;

/// Full scan over a table heap. Each row is read under the isolation
/// level's shared-lock protocol, filtered, and projected.
pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    predicate: Option<Expression>,
    projection: Option<Vec<usize>>,
    output_schema: Schema,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        table_info: Arc<TableInfo>,
        predicate: Option<Expression>,
        projection: Option<Vec<usize>>,
    ) -> Self {
        let output_schema = projected_schema(&table_info.schema, projection.as_deref());
        Self {
            ctx,
            table_info,
            predicate,
            projection,
            output_schema,
            iter: None,
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.iter = Some(self.table_info.table.iter());
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None); // next() before init()
        };
        loop {
            let Some((tuple, rid)) = iter.next()? else {
                return Ok(None);
            };

            let acquired = self.ctx.lock_row_shared(rid)?;
            let passes = match &self.predicate {
                Some(predicate) => {
                    predicate.evaluate_as_predicate(&tuple, &self.table_info.schema)?
                }
                None => true,
            };
            let row = if passes {
                Some(project(&tuple, &self.table_info.schema, self.projection.as_deref(), rid)?)
            } else {
                None
            };
            self.ctx.unlock_row_after_read(rid, acquired);

            if let Some(row) = row {
                return Ok(Some((row, rid)));
            }
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}

/// Schema of a column subset (None keeps the input schema).
pub(crate) fn projected_schema(schema: &Schema, projection: Option<&[usize]>) -> Schema {
    match projection {
        None => schema.clone(),
        Some(cols) => Schema::new(
            cols.iter()
                .filter_map(|&i| schema.column(i).cloned())
                .collect(),
        ),
    }
}

/// Rebuild a tuple keeping only the projected columns.
pub(crate) fn project(
    tuple: &Tuple,
    schema: &Schema,
    projection: Option<&[usize]>,
    rid: Rid,
) -> ExecutionResult<Tuple> {
    match projection {
        None => Ok(Tuple::from_bytes(rid, tuple.data.clone())),
        Some(cols) => {
            let values = tuple.key_from_tuple(schema, cols)?;
            let mut out = Tuple::from_values(&values)?;
            out.rid = rid;
            Ok(out)
        }
    }
}
