//! In-process backend over columns of [`Datum`] values.
//!
//! A reference backend for tests and small samples. Production reads go
//! through [`DataFusionSource`](super::DataFusionSource); this table evaluates
//! the same plan without a query engine so the reader can be checked against
//! an independent implementation of [`TabularSource`].
//!
//! Follows SQL null semantics: nulls are skipped by `Mean` and `Sum`, counted
//! by `Count`, and propagate through arithmetic. Projections never replace an
//! existing column.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

use super::expr::{Reduction, ScalarExpr};
use super::{Datum, GroupKey, Row, TabularSource};
use crate::error::{AggregateError, AggregateResult};

/// A columnar in-memory table.
///
/// ```rust
/// use tea_aggregates::backend::MemoryTable;
///
/// let table = MemoryTable::new()
///     .with_column("variant", ["a", "b", "a"])
///     .unwrap()
///     .with_column("orders", [1.0, 2.0, 4.0])
///     .unwrap();
/// assert_eq!(table.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    columns: BTreeMap<String, Vec<Datum>>,
    len: usize,
    group_column: Option<String>,
    result: Option<Vec<Row>>,
}

type GroupMeans = HashMap<String, Option<f64>>;

/// Row indices of one group.
struct Group {
    key: Option<GroupKey>,
    rows: Vec<usize>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a column. All columns must have the same length.
    pub fn with_column<I, T>(mut self, name: impl Into<String>, values: I) -> AggregateResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Datum>,
    {
        let name = name.into();
        let values: Vec<Datum> = values.into_iter().map(Into::into).collect();
        let replacing_only_column = self.columns.len() == 1 && self.columns.contains_key(&name);
        if !self.columns.is_empty() && !replacing_only_column && values.len() != self.len {
            return Err(AggregateError::invalid_data(format!(
                "column '{name}' has {} values, table has {} rows",
                values.len(),
                self.len
            )));
        }
        self.len = values.len();
        self.columns.insert(name, values);
        Ok(self)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Values of a column.
    pub fn column(&self, name: &str) -> Option<&[Datum]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Appends the rows of `other`. Both tables must have the same columns.
    pub fn concat(&self, other: &MemoryTable) -> AggregateResult<Self> {
        if self.columns.is_empty() {
            return Ok(other.clone());
        }
        if other.columns.is_empty() {
            return Ok(self.clone());
        }
        if !self.columns.keys().eq(other.columns.keys()) {
            return Err(AggregateError::invalid_data(
                "cannot concatenate tables with different columns",
            ));
        }

        let mut table = MemoryTable::new();
        for (name, values) in &self.columns {
            let combined = values.iter().chain(&other.columns[name]).cloned();
            table = table.with_column(name.clone(), combined)?;
        }
        Ok(table)
    }

    fn values(&self, name: &str) -> AggregateResult<&[Datum]> {
        self.column(name).ok_or_else(|| AggregateError::ColumnNotFound {
            column: name.to_string(),
        })
    }

    fn groups(&self) -> AggregateResult<Vec<Group>> {
        let Some(group_column) = &self.group_column else {
            return Ok(vec![Group {
                key: None,
                rows: (0..self.len).collect(),
            }]);
        };

        let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
        for (i, value) in self.values(group_column)?.iter().enumerate() {
            groups.entry(GroupKey::try_from(value)?).or_default().push(i);
        }
        Ok(groups
            .into_iter()
            .map(|(key, rows)| Group {
                key: Some(key),
                rows,
            })
            .collect())
    }

    fn number(&self, column: &str, row: usize) -> AggregateResult<Option<f64>> {
        match &self.values(column)?[row] {
            Datum::Null => Ok(None),
            Datum::Boolean(v) => Ok(Some(if *v { 1.0 } else { 0.0 })),
            datum => datum.as_f64().map(Some).ok_or_else(|| {
                AggregateError::invalid_data(format!(
                    "column '{column}' holds a non-numeric value: {datum:?}"
                ))
            }),
        }
    }

    fn group_mean(&self, column: &str, rows: &[usize]) -> AggregateResult<Option<f64>> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for &row in rows {
            if let Some(value) = self.number(column, row)? {
                sum += value;
                n += 1;
            }
        }
        Ok((n > 0).then(|| sum / n as f64))
    }

    /// Means of the columns `expr` reads through [`ScalarExpr::GroupMean`].
    fn group_means(&self, expr: &ScalarExpr, group: &Group) -> AggregateResult<GroupMeans> {
        let mut names = Vec::new();
        group_mean_columns(expr, &mut names);
        let mut means = HashMap::with_capacity(names.len());
        for name in names {
            if !means.contains_key(name) {
                means.insert(name.to_string(), self.group_mean(name, &group.rows)?);
            }
        }
        Ok(means)
    }

    fn eval_scalar(
        &self,
        expr: &ScalarExpr,
        row: usize,
        means: &GroupMeans,
    ) -> AggregateResult<Option<f64>> {
        match expr {
            ScalarExpr::Column(name) => self.number(name, row),
            ScalarExpr::Literal(value) => Ok(Some(*value)),
            ScalarExpr::GroupMean(name) => Ok(means.get(name).copied().flatten()),
            ScalarExpr::Binary { op, left, right } => {
                let left = self.eval_scalar(left, row, means)?;
                let right = self.eval_scalar(right, row, means)?;
                Ok(left.zip(right).map(|(l, r)| op.apply(l, r)))
            }
        }
    }

    fn eval_reduction(
        &self,
        reduction: &Reduction,
        group: &Group,
        nested: bool,
    ) -> AggregateResult<Datum> {
        match reduction {
            Reduction::Count if nested => Ok(Datum::Float(group.rows.len() as f64)),
            Reduction::Count => Ok(Datum::Int(group.rows.len() as i64)),
            Reduction::Mean(expr) | Reduction::Sum(expr) => {
                let means = self.group_means(expr, group)?;
                let mut sum = 0.0;
                let mut n = 0usize;
                for &row in &group.rows {
                    if let Some(value) = self.eval_scalar(expr, row, &means)? {
                        sum += value;
                        n += 1;
                    }
                }
                Ok(match (n, reduction) {
                    (0, _) => Datum::Null,
                    (_, Reduction::Mean(_)) => Datum::Float(sum / n as f64),
                    _ => Datum::Float(sum),
                })
            }
            Reduction::Literal(value) => Ok(Datum::Float(*value)),
            Reduction::Binary { op, left, right } => {
                let left = self.eval_reduction(left, group, true)?.as_f64();
                let right = self.eval_reduction(right, group, true)?.as_f64();
                Ok(left.zip(right).map_or(Datum::Null, |(l, r)| Datum::Float(op.apply(l, r))))
            }
        }
    }

    fn ensure_not_aggregated(&self, operation: &str) -> AggregateResult<()> {
        if self.result.is_some() {
            return Err(AggregateError::not_supported(format!(
                "{operation} after aggregate is not supported"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TabularSource for MemoryTable {
    fn group_by(mut self, column: &str) -> AggregateResult<Self> {
        self.ensure_not_aggregated("group_by")?;
        self.values(column)?;
        self.group_column = Some(column.to_string());
        Ok(self)
    }

    fn project_with(mut self, columns: Vec<(String, ScalarExpr)>) -> AggregateResult<Self> {
        self.ensure_not_aggregated("project_with")?;
        let groups = self.groups()?;

        let mut derived = Vec::with_capacity(columns.len());
        for (alias, expr) in &columns {
            if self.columns.contains_key(alias) {
                return Err(AggregateError::invalid_data(format!(
                    "projected column '{alias}' would shadow an existing column"
                )));
            }
            let mut values = vec![Datum::Null; self.len];
            for group in &groups {
                let means = self.group_means(expr, group)?;
                for &row in &group.rows {
                    values[row] = self.eval_scalar(expr, row, &means)?.into();
                }
            }
            derived.push((alias.clone(), values));
        }

        for (alias, values) in derived {
            self.columns.insert(alias, values);
        }
        Ok(self)
    }

    fn aggregate(mut self, reductions: Vec<(String, Reduction)>) -> AggregateResult<Self> {
        self.ensure_not_aggregated("aggregate")?;

        let mut rows = Vec::new();
        for group in self.groups()? {
            let mut fields = HashMap::with_capacity(reductions.len() + 1);
            if let (Some(column), Some(key)) = (&self.group_column, &group.key) {
                fields.insert(column.clone(), group_datum(key));
            }
            for (alias, reduction) in &reductions {
                fields.insert(alias.clone(), self.eval_reduction(reduction, &group, false)?);
            }
            rows.push(Row::new(group.key, fields));
        }

        self.result = Some(rows);
        Ok(self)
    }

    async fn materialize(self) -> AggregateResult<Vec<Row>> {
        if let Some(rows) = self.result {
            return Ok(rows);
        }

        let mut rows = Vec::with_capacity(self.len);
        for i in 0..self.len {
            let fields: HashMap<String, Datum> = self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[i].clone()))
                .collect();
            let group = match &self.group_column {
                Some(column) => Some(GroupKey::try_from(&fields[column])?),
                None => None,
            };
            rows.push(Row::new(group, fields));
        }
        Ok(rows)
    }

    fn description(&self) -> String {
        format!(
            "in-memory table ({} rows, {} columns)",
            self.len,
            self.columns.len()
        )
    }
}

fn group_mean_columns<'a>(expr: &'a ScalarExpr, out: &mut Vec<&'a str>) {
    match expr {
        ScalarExpr::GroupMean(name) => out.push(name),
        ScalarExpr::Binary { left, right, .. } => {
            group_mean_columns(left, out);
            group_mean_columns(right, out);
        }
        ScalarExpr::Column(_) | ScalarExpr::Literal(_) => {}
    }
}

fn group_datum(key: &GroupKey) -> Datum {
    match key {
        GroupKey::Null => Datum::Null,
        GroupKey::Boolean(v) => Datum::Boolean(*v),
        GroupKey::Int(v) => Datum::Int(*v),
        GroupKey::Text(v) => Datum::Text(v.clone()),
    }
}
