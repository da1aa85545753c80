use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::execution::expression::Expression;
use crate::storage::table::tuple::Tuple;

/// Classic outer/inner loop join. The inner side is rewound (re-inited)
/// once per outer row; matching pairs are emitted as concatenated rows.
pub struct NestedLoopJoinExecutor {
    left: BoxedExecutor,
    right: BoxedExecutor,
    predicate: Option<Expression>,
    output_schema: Schema,
    current_left: Option<Tuple>,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        left: BoxedExecutor,
        right: BoxedExecutor,
        predicate: Option<Expression>,
    ) -> Self {
        let output_schema = left.output_schema().concat(right.output_schema());
        Self {
            left,
            right,
            predicate,
            output_schema,
            current_left: None,
        }
    }

    fn joined(&self, left: &Tuple, right: &Tuple) -> ExecutionResult<Tuple> {
        let mut values = left.values(self.left.output_schema())?;
        values.extend(right.values(self.right.output_schema())?);
        Ok(Tuple::from_values(&values)?)
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.left.init()?;
        self.right.init()?;
        self.current_left = self.left.next()?.map(|(tuple, _)| tuple);
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        loop {
            let Some(left_tuple) = self.current_left.clone() else {
                return Ok(None);
            };
            match self.right.next()? {
                Some((right_tuple, _)) => {
                    let matches = match &self.predicate {
                        Some(predicate) => predicate
                            .evaluate_join(
                                &left_tuple,
                                self.left.output_schema(),
                                &right_tuple,
                                self.right.output_schema(),
                            )?
                            .as_bool(),
                        None => true,
                    };
                    if matches {
                        let row = self.joined(&left_tuple, &right_tuple)?;
                        return Ok(Some((row, Rid::invalid())));
                    }
                }
                None => {
                    // inner side exhausted: advance the outer row and rescan
                    self.current_left = self.left.next()?.map(|(tuple, _)| tuple);
                    if self.current_left.is_some() {
                        self.right.init()?;
                    }
                }
            }
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
