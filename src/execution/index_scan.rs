use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::executor::{ExecutionResult, Executor};
use crate::execution::expression::Expression;
use crate::execution::seq_scan::{project, projected_schema};
use crate::index::btree::TreeIterator;
use crate::storage::table::tuple::Tuple;

/// Key-ordered scan driven by the B+tree iterator; each index entry is
/// resolved to its heap tuple before filtering and projection.
pub struct IndexScanExecutor {
    table_info: Arc<TableInfo>,
    index_info: Arc<IndexInfo>,
    begin_key: Option<i64>,
    end_key: Option<i64>,
    predicate: Option<Expression>,
    projection: Option<Vec<usize>>,
    output_schema: Schema,
    iter: Option<TreeIterator<i64>>,
}

impl IndexScanExecutor {
    pub fn new(
        table_info: Arc<TableInfo>,
        index_info: Arc<IndexInfo>,
        begin_key: Option<i64>,
        end_key: Option<i64>,
        predicate: Option<Expression>,
        projection: Option<Vec<usize>>,
    ) -> Self {
        let output_schema = projected_schema(&table_info.schema, projection.as_deref());
        Self {
            table_info,
            index_info,
            begin_key,
            end_key,
            predicate,
            projection,
            output_schema,
            iter: None,
        }
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.iter = Some(match self.begin_key {
            Some(key) => self.index_info.index.begin_at(&key)?,
            None => self.index_info.index.begin()?,
        });
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None); // next() before init()
        };
        loop {
            let Some((key, rid)) = iter.current().map(|(k, rid)| (*k, rid)) else {
                return Ok(None);
            };
            if matches!(self.end_key, Some(end) if key > end) {
                return Ok(None);
            }
            iter.advance()?;

            let Some(tuple) = self.table_info.table.get_tuple(rid)? else {
                continue; // entry for a row deleted underneath us
            };
            let passes = match &self.predicate {
                Some(predicate) => {
                    predicate.evaluate_as_predicate(&tuple, &self.table_info.schema)?
                }
                None => true,
            };
            if passes {
                let row =
                    project(&tuple, &self.table_info.schema, self.projection.as_deref(), rid)?;
                return Ok(Some((row, rid)));
            }
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
