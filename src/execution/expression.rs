use std::cmp::Ordering;

use crate::catalog::schema::Schema;
use crate::execution::executor::{ExecutionError, ExecutionResult};
use crate::storage::table::tuple::{Tuple, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Minimal predicate/projection language the operators evaluate against a
/// schema: column references (with a side for joins), constants, and
/// comparisons.
#[derive(Debug, Clone)]
pub enum Expression {
    /// `tuple_index` picks the side in a join (0 = outer, 1 = inner);
    /// single-table evaluation uses side 0.
    Column { tuple_index: usize, col_index: usize },
    Constant(Value),
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn column(col_index: usize) -> Self {
        Expression::Column {
            tuple_index: 0,
            col_index,
        }
    }

    pub fn join_column(tuple_index: usize, col_index: usize) -> Self {
        Expression::Column {
            tuple_index,
            col_index,
        }
    }

    pub fn constant(value: Value) -> Self {
        Expression::Constant(value)
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> ExecutionResult<Value> {
        self.evaluate_join(tuple, schema, tuple, schema)
    }

    /// Evaluate with an outer and an inner row in scope.
    pub fn evaluate_join(
        &self,
        outer: &Tuple,
        outer_schema: &Schema,
        inner: &Tuple,
        inner_schema: &Schema,
    ) -> ExecutionResult<Value> {
        match self {
            Expression::Column {
                tuple_index,
                col_index,
            } => {
                let (tuple, schema) = if *tuple_index == 0 {
                    (outer, outer_schema)
                } else {
                    (inner, inner_schema)
                };
                Ok(tuple.value(schema, *col_index)?)
            }
            Expression::Constant(value) => Ok(value.clone()),
            Expression::Compare { op, left, right } => {
                let lhs = left.evaluate_join(outer, outer_schema, inner, inner_schema)?;
                let rhs = right.evaluate_join(outer, outer_schema, inner, inner_schema)?;
                Ok(Value::Boolean(compare(*op, &lhs, &rhs)))
            }
        }
    }

    /// Evaluate as a predicate; non-boolean results are a type error.
    pub fn evaluate_as_predicate(&self, tuple: &Tuple, schema: &Schema) -> ExecutionResult<bool> {
        match self.evaluate(tuple, schema)? {
            Value::Boolean(b) => Ok(b),
            other => Err(ExecutionError::Type(format!(
                "predicate evaluated to {}, expected a boolean",
                other
            ))),
        }
    }
}

/// Comparisons against NULL (and across incomparable types) are false.
fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    match lhs.partial_cmp(rhs) {
        None => false,
        Some(ordering) => match op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        },
    }
}
