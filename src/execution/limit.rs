use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::storage::table::tuple::Tuple;

/// Discards `offset` rows, then passes through at most `limit` rows.
pub struct LimitExecutor {
    child: BoxedExecutor,
    limit: usize,
    offset: usize,
    skipped: usize,
    emitted: usize,
}

impl LimitExecutor {
    pub fn new(child: BoxedExecutor, limit: usize, offset: usize) -> Self {
        Self {
            child,
            limit,
            offset,
            skipped: 0,
            emitted: 0,
        }
    }
}

impl Executor for LimitExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.skipped = 0;
        self.emitted = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        while self.skipped < self.offset {
            if self.child.next()?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        if self.emitted >= self.limit {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn output_schema(&self) -> &Schema {
        self.child.output_schema()
    }
}
