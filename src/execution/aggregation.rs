use std::collections::HashMap;

use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::execution::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::execution::expression::Expression;
use crate::storage::table::tuple::{Tuple, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    CountStar,
    Sum,
    Min,
    Max,
}

/// Hash aggregation: the child stream is fully materialized into a table
/// keyed by the group-by values, then groups stream out, optionally gated
/// by a HAVING predicate evaluated over the output row (group-by columns
/// followed by aggregate columns).
pub struct AggregationExecutor {
    child: BoxedExecutor,
    group_bys: Vec<Expression>,
    aggregates: Vec<(AggregationType, Expression)>,
    having: Option<Expression>,
    output_schema: Schema,
    results: Vec<Tuple>,
}

impl AggregationExecutor {
    pub fn new(
        child: BoxedExecutor,
        group_bys: Vec<Expression>,
        aggregates: Vec<(AggregationType, Expression)>,
        having: Option<Expression>,
        output_schema: Schema,
    ) -> Self {
        Self {
            child,
            group_bys,
            aggregates,
            having,
            output_schema,
            results: Vec::new(),
        }
    }

    fn initial_values(&self) -> Vec<Value> {
        self.aggregates
            .iter()
            .map(|(agg_type, _)| match agg_type {
                AggregationType::CountStar => Value::Integer(0),
                AggregationType::Sum => Value::Integer(0),
                AggregationType::Min | AggregationType::Max => Value::Null,
            })
            .collect()
    }

    fn combine(&self, acc: &mut [Value], input: &[Value]) {
        for (slot, ((agg_type, _), value)) in
            acc.iter_mut().zip(self.aggregates.iter().zip(input))
        {
            match agg_type {
                AggregationType::CountStar => {
                    if let Value::Integer(count) = slot {
                        *count += 1;
                    }
                }
                AggregationType::Sum => {
                    if let (Value::Integer(total), Value::Integer(v)) = (&mut *slot, value) {
                        *total += v;
                    }
                }
                AggregationType::Min => {
                    if *slot == Value::Null || matches!(value.partial_cmp(slot), Some(o) if o.is_lt())
                    {
                        *slot = value.clone();
                    }
                }
                AggregationType::Max => {
                    if *slot == Value::Null || matches!(value.partial_cmp(slot), Some(o) if o.is_gt())
                    {
                        *slot = value.clone();
                    }
                }
            }
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.results.clear();

        let child_schema = self.child.output_schema().clone();
        let mut table: HashMap<Vec<Value>, Vec<Value>> = HashMap::new();
        while let Some((tuple, _)) = self.child.next()? {
            let key: Vec<Value> = self
                .group_bys
                .iter()
                .map(|expr| expr.evaluate(&tuple, &child_schema))
                .collect::<ExecutionResult<_>>()?;
            let input: Vec<Value> = self
                .aggregates
                .iter()
                .map(|(_, expr)| expr.evaluate(&tuple, &child_schema))
                .collect::<ExecutionResult<_>>()?;
            let acc = table
                .entry(key)
                .or_insert_with(|| self.initial_values());
            self.combine(acc, &input);
        }

        for (key, aggregates) in table {
            let mut values = key;
            values.extend(aggregates);
            self.results.push(Tuple::from_values(&values)?);
        }
        // deterministic group order for consumers and tests
        self.results.sort_by(|a, b| a.data.cmp(&b.data));
        self.results.reverse();
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        while let Some(tuple) = self.results.pop() {
            let keep = match &self.having {
                Some(having) => having.evaluate_as_predicate(&tuple, &self.output_schema)?,
                None => true,
            };
            if keep {
                return Ok(Some((tuple, Rid::invalid())));
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
