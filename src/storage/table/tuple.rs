use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::schema::Schema;
use crate::common::types::Rid;

#[derive(Error, Debug)]
pub enum TupleError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("column index {0} out of range")]
    ColumnOutOfRange(usize),
}

/// A single column value. Integers and floats compare across types; Null is
/// incomparable with everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Integer(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Text(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl Value {
    pub fn as_bool(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// A row: the bincode image of its value vector, plus the RID it was read
/// from (invalid until the row lands in a table heap).
#[derive(Debug, Clone)]
pub struct Tuple {
    pub rid: Rid,
    pub data: Vec<u8>,
}

impl Tuple {
    pub fn from_values(values: &[Value]) -> Result<Self, TupleError> {
        let data =
            bincode::serialize(values).map_err(|e| TupleError::Serialization(e.to_string()))?;
        Ok(Self {
            rid: Rid::invalid(),
            data,
        })
    }

    pub fn from_bytes(rid: Rid, data: Vec<u8>) -> Self {
        Self { rid, data }
    }

    pub fn values(&self, _schema: &Schema) -> Result<Vec<Value>, TupleError> {
        bincode::deserialize(&self.data).map_err(|e| TupleError::Serialization(e.to_string()))
    }

    pub fn value(&self, schema: &Schema, index: usize) -> Result<Value, TupleError> {
        let values = self.values(schema)?;
        values
            .get(index)
            .cloned()
            .ok_or(TupleError::ColumnOutOfRange(index))
    }

    /// Project the key attributes out of this tuple, in key-schema order.
    pub fn key_from_tuple(
        &self,
        schema: &Schema,
        key_attrs: &[usize],
    ) -> Result<Vec<Value>, TupleError> {
        let values = self.values(schema)?;
        key_attrs
            .iter()
            .map(|&i| {
                values
                    .get(i)
                    .cloned()
                    .ok_or(TupleError::ColumnOutOfRange(i))
            })
            .collect()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
