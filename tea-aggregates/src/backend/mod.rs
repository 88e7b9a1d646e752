//! Tabular backends that aggregates are read from.
//!
//! The reader never touches raw rows. It describes the work as a small
//! relational plan (group, derive columns, reduce) and hands it to a
//! [`TabularSource`], which executes it wherever the data lives and returns
//! the reduced rows.
//!
//! Two backends are provided:
//!
//! - [`DataFusionSource`]: renders the plan to SQL and runs it on a DataFusion
//!   [`SessionContext`](::datafusion::prelude::SessionContext).
//! - [`MemoryTable`]: evaluates the plan over in-process columns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug};

use crate::error::{AggregateError, AggregateResult};

pub mod datafusion;
pub mod expr;
pub mod memory;

pub use self::datafusion::DataFusionSource;
pub use expr::{BinaryOp, Reduction, ScalarExpr};
pub use memory::MemoryTable;

/// Relational capabilities a backend must offer to compute aggregates.
///
/// Operations are lazy and consume the source, returning the transformed
/// source. Only [`materialize`](TabularSource::materialize) runs the plan.
///
/// After [`group_by`](TabularSource::group_by), [`ScalarExpr::GroupMean`] is
/// evaluated within each group and [`aggregate`](TabularSource::aggregate)
/// yields one row per distinct group value, with the value available through
/// [`Row::group`]. Without grouping, `aggregate` yields exactly one row.
///
/// Backend errors (unknown columns, unsupported operations) are returned as is.
#[async_trait]
pub trait TabularSource: Debug + Send + Sync + Sized {
    /// Partitions subsequent operations by the values of `column`.
    fn group_by(self, column: &str) -> AggregateResult<Self>;

    /// Adds derived columns, keeping all existing ones.
    fn project_with(self, columns: Vec<(String, ScalarExpr)>) -> AggregateResult<Self>;

    /// Reduces the rows of each group to the named reductions.
    fn aggregate(self, reductions: Vec<(String, Reduction)>) -> AggregateResult<Self>;

    /// Executes the plan and returns the resulting rows.
    async fn materialize(self) -> AggregateResult<Vec<Row>>;

    /// Human-readable description for logs.
    fn description(&self) -> String;
}

/// A scalar value in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Datum {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Numeric value, if the datum is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Int(v) => Some(*v as f64),
            Datum::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Datum::Float(value)
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Int(value)
    }
}

impl From<bool> for Datum {
    fn from(value: bool) -> Self {
        Datum::Boolean(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Text(value.to_string())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::Text(value)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map_or(Datum::Null, Into::into)
    }
}

/// Value of a grouping column.
///
/// Floating-point group values are rejected since they have no total order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    Null,
    Boolean(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Null => f.write_str("NULL"),
            GroupKey::Boolean(v) => write!(f, "{v}"),
            GroupKey::Int(v) => write!(f, "{v}"),
            GroupKey::Text(v) => f.write_str(v),
        }
    }
}

impl TryFrom<&Datum> for GroupKey {
    type Error = AggregateError;

    fn try_from(datum: &Datum) -> AggregateResult<Self> {
        match datum {
            Datum::Null => Ok(GroupKey::Null),
            Datum::Boolean(v) => Ok(GroupKey::Boolean(*v)),
            Datum::Int(v) => Ok(GroupKey::Int(*v)),
            Datum::Text(v) => Ok(GroupKey::Text(v.clone())),
            Datum::Float(v) => Err(AggregateError::invalid_data(format!(
                "floating-point group value {v} cannot be used as a group key"
            ))),
        }
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        GroupKey::Text(value.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        GroupKey::Text(value)
    }
}

impl From<i64> for GroupKey {
    fn from(value: i64) -> Self {
        GroupKey::Int(value)
    }
}

impl From<bool> for GroupKey {
    fn from(value: bool) -> Self {
        GroupKey::Boolean(value)
    }
}

/// A materialized row: an optional group value and named scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    group: Option<GroupKey>,
    fields: HashMap<String, Datum>,
}

impl Row {
    pub fn new(group: Option<GroupKey>, fields: HashMap<String, Datum>) -> Self {
        Self { group, fields }
    }

    /// Group value, for rows of a grouped source.
    pub fn group(&self) -> Option<&GroupKey> {
        self.group.as_ref()
    }

    /// Raw field value.
    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.fields.get(name)
    }

    /// Numeric field value. Missing, null and non-numeric fields are errors.
    pub fn float(&self, name: &str) -> AggregateResult<f64> {
        match self.fields.get(name) {
            None => Err(AggregateError::invalid_data(format!(
                "field '{name}' missing from result row"
            ))),
            Some(Datum::Null) => Err(AggregateError::invalid_data(format!(
                "field '{name}' is null"
            ))),
            Some(datum) => datum.as_f64().ok_or_else(|| {
                AggregateError::invalid_data(format!("field '{name}' is not numeric: {datum:?}"))
            }),
        }
    }

    /// Non-negative integral field value, such as a row count.
    pub fn count(&self, name: &str) -> AggregateResult<u64> {
        match self.fields.get(name) {
            Some(Datum::Int(v)) if *v >= 0 => Ok(*v as u64),
            Some(Datum::Float(v)) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as u64),
            other => Err(AggregateError::invalid_data(format!(
                "field '{name}' is not a count: {other:?}"
            ))),
        }
    }
}
