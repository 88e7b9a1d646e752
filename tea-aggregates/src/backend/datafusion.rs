//! DataFusion backend: plans are rendered to SQL and executed on a
//! [`SessionContext`].

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::util::display::array_value_to_string;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::expr::{Reduction, ScalarExpr};
use super::{Datum, GroupKey, Row, TabularSource};
use crate::config::EngineConfig;
use crate::error::{AggregateError, AggregateResult};
use crate::logging::truncate_query;
use crate::security::SqlSecurity;

/// Table name used when a source is built from a record batch.
pub const DEFAULT_TABLE_NAME: &str = "data";

/// A lazily built SQL query over a DataFusion session.
///
/// Each operation wraps the current query in a subquery; nothing runs until
/// [`TabularSource::materialize`].
///
/// ```rust
/// use std::sync::Arc;
/// use arrow::array::{Float64Array, RecordBatch};
/// use arrow::datatypes::{DataType, Field, Schema};
/// use tea_aggregates::backend::DataFusionSource;
/// use tea_aggregates::reader::read_aggregates;
/// use tea_aggregates::aggregates::AggregateRequest;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> tea_aggregates::error::AggregateResult<()> {
/// let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, false)]));
/// let batch = RecordBatch::try_new(
///     schema,
///     vec![Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0]))],
/// )?;
///
/// let source = DataFusionSource::from_batch(batch)?;
/// let aggr = read_aggregates(source, &AggregateRequest::new().with_var("x")).await?;
/// assert_eq!(aggr.count()?, 3);
/// assert_eq!(aggr.var("x")?, 1.0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DataFusionSource {
    ctx: SessionContext,
    query: String,
    group_column: Option<String>,
    aggregated: bool,
    depth: usize,
}

impl fmt::Debug for DataFusionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFusionSource")
            .field("session_id", &self.ctx.session_id())
            .field("query", &self.query)
            .field("group_column", &self.group_column)
            .field("aggregated", &self.aggregated)
            .finish()
    }
}

impl DataFusionSource {
    /// Reads all rows of a registered table.
    pub fn table(ctx: SessionContext, name: &str) -> AggregateResult<Self> {
        let query = format!("SELECT * FROM {}", SqlSecurity::escape_identifier(name)?);
        Ok(Self::from_sql(ctx, query))
    }

    /// Uses an arbitrary query as the base relation.
    pub fn from_sql(ctx: SessionContext, query: impl Into<String>) -> Self {
        Self {
            ctx,
            query: query.into(),
            group_column: None,
            aggregated: false,
            depth: 0,
        }
    }

    /// Registers `batch` as table `data` in a fresh session.
    pub fn from_batch(batch: RecordBatch) -> AggregateResult<Self> {
        Self::from_batches(SessionContext::new(), vec![batch])
    }

    /// Registers `batch` as table `data` in a session built from `config`.
    pub fn from_batch_with_config(config: &EngineConfig, batch: RecordBatch) -> AggregateResult<Self> {
        Self::from_batches(config.session_context()?, vec![batch])
    }

    fn from_batches(ctx: SessionContext, batches: Vec<RecordBatch>) -> AggregateResult<Self> {
        let schema = batches
            .first()
            .map(|batch| batch.schema())
            .ok_or(AggregateError::NoData)?;
        let table = MemTable::try_new(schema, vec![batches])?;
        ctx.register_table(DEFAULT_TABLE_NAME, Arc::new(table))?;
        Self::table(ctx, DEFAULT_TABLE_NAME)
    }

    /// The SQL text built so far.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The session queries run on.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    fn wrap(mut self, select: String, group_by: Option<String>) -> Self {
        let mut query = format!("SELECT {select} FROM ({}) AS \"_t{}\"", self.query, self.depth);
        if let Some(group_by) = group_by {
            query.push_str(" GROUP BY ");
            query.push_str(&group_by);
        }
        self.query = query;
        self.depth += 1;
        self
    }

    fn render_scalar(&self, expr: &ScalarExpr) -> AggregateResult<String> {
        Ok(match expr {
            ScalarExpr::Column(name) => {
                format!("CAST({} AS DOUBLE)", SqlSecurity::escape_identifier(name)?)
            }
            ScalarExpr::Literal(value) => render_literal(*value),
            ScalarExpr::GroupMean(name) => {
                let window = match &self.group_column {
                    Some(group) => format!("PARTITION BY {}", SqlSecurity::escape_identifier(group)?),
                    None => String::new(),
                };
                format!(
                    "AVG(CAST({} AS DOUBLE)) OVER ({window})",
                    SqlSecurity::escape_identifier(name)?
                )
            }
            ScalarExpr::Binary { op, left, right } => format!(
                "({} {} {})",
                self.render_scalar(left)?,
                op.sql(),
                self.render_scalar(right)?
            ),
        })
    }

    fn render_reduction(&self, reduction: &Reduction, nested: bool) -> AggregateResult<String> {
        Ok(match reduction {
            // COUNT(*) is BIGINT; keep it integral at the top level only
            Reduction::Count if nested => "CAST(COUNT(*) AS DOUBLE)".to_string(),
            Reduction::Count => "COUNT(*)".to_string(),
            Reduction::Mean(expr) => format!("AVG({})", self.render_scalar(expr)?),
            Reduction::Sum(expr) => format!("SUM({})", self.render_scalar(expr)?),
            Reduction::Literal(value) => render_literal(*value),
            Reduction::Binary { op, left, right } => format!(
                "({} {} {})",
                self.render_reduction(left, true)?,
                op.sql(),
                self.render_reduction(right, true)?
            ),
        })
    }
}

fn render_literal(value: f64) -> String {
    if value.is_nan() {
        "CAST('NaN' AS DOUBLE)".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("CAST('{sign}inf' AS DOUBLE)")
    } else {
        format!("CAST({value:?} AS DOUBLE)")
    }
}

#[async_trait]
impl TabularSource for DataFusionSource {
    fn group_by(mut self, column: &str) -> AggregateResult<Self> {
        if self.aggregated {
            return Err(AggregateError::not_supported(
                "group_by after aggregate is not supported",
            ));
        }
        SqlSecurity::validate_identifier(column)?;
        self.group_column = Some(column.to_string());
        Ok(self)
    }

    fn project_with(self, columns: Vec<(String, ScalarExpr)>) -> AggregateResult<Self> {
        if self.aggregated {
            return Err(AggregateError::not_supported(
                "project_with after aggregate is not supported",
            ));
        }
        if columns.is_empty() {
            return Ok(self);
        }

        let mut select = vec!["*".to_string()];
        for (alias, expr) in &columns {
            select.push(format!(
                "{} AS {}",
                self.render_scalar(expr)?,
                SqlSecurity::escape_identifier(alias)?
            ));
        }
        Ok(self.wrap(select.join(", "), None))
    }

    fn aggregate(self, reductions: Vec<(String, Reduction)>) -> AggregateResult<Self> {
        if self.aggregated {
            return Err(AggregateError::not_supported(
                "aggregate over an aggregated source is not supported",
            ));
        }

        let group = self
            .group_column
            .as_deref()
            .map(SqlSecurity::escape_identifier)
            .transpose()?;

        let mut select = Vec::with_capacity(reductions.len() + 1);
        if let Some(group) = &group {
            select.push(format!("{group} AS {group}"));
        }
        for (alias, reduction) in &reductions {
            select.push(format!(
                "{} AS {}",
                self.render_reduction(reduction, false)?,
                SqlSecurity::escape_identifier(alias)?
            ));
        }
        if select.is_empty() {
            return Err(AggregateError::not_supported(
                "aggregate requires at least one reduction",
            ));
        }

        let mut source = self.wrap(select.join(", "), group);
        source.aggregated = true;
        Ok(source)
    }

    #[instrument(skip(self), fields(depth = self.depth, grouped = self.group_column.is_some()))]
    async fn materialize(self) -> AggregateResult<Vec<Row>> {
        debug!(
            query = %truncate_query(&self.query),
            "Executing aggregation query"
        );

        let df = self.ctx.sql(&self.query).await?;
        let batches = df.collect().await?;

        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(batch_rows(batch, self.group_column.as_deref())?);
        }

        debug!(rows = rows.len(), batches = batches.len(), "Query returned");
        Ok(rows)
    }

    fn description(&self) -> String {
        format!(
            "DataFusion query: {}",
            truncate_query(&self.query)
        )
    }
}

fn batch_rows(batch: &RecordBatch, group_column: Option<&str>) -> AggregateResult<Vec<Row>> {
    let schema = batch.schema();
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        columns.push((field.name().as_str(), column_datums(array)?));
    }

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let mut group = None;
        let mut fields = HashMap::with_capacity(columns.len());
        for (name, values) in &columns {
            let value = values[i].clone();
            if Some(*name) == group_column {
                group = Some(GroupKey::try_from(&value)?);
            }
            fields.insert(name.to_string(), value);
        }
        rows.push(Row::new(group, fields));
    }
    Ok(rows)
}

fn column_datums(array: &ArrayRef) -> AggregateResult<Vec<Datum>> {
    let len = array.len();
    let data_type = array.data_type();

    let datums = if data_type.is_integer() {
        let values = cast(array, &DataType::Int64)?;
        let values = values.as_primitive::<Int64Type>();
        (0..len)
            .map(|i| if values.is_null(i) { Datum::Null } else { Datum::Int(values.value(i)) })
            .collect()
    } else if data_type.is_floating()
        || matches!(data_type, DataType::Decimal128(_, _) | DataType::Decimal256(_, _))
    {
        let values = cast(array, &DataType::Float64)?;
        let values = values.as_primitive::<Float64Type>();
        (0..len)
            .map(|i| if values.is_null(i) { Datum::Null } else { Datum::Float(values.value(i)) })
            .collect()
    } else if matches!(data_type, DataType::Boolean) {
        let values = array.as_boolean();
        (0..len)
            .map(|i| if values.is_null(i) { Datum::Null } else { Datum::Boolean(values.value(i)) })
            .collect()
    } else if matches!(data_type, DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View) {
        let values = cast(array, &DataType::Utf8)?;
        let values = values.as_string::<i32>();
        (0..len)
            .map(|i| {
                if values.is_null(i) {
                    Datum::Null
                } else {
                    Datum::Text(values.value(i).to_string())
                }
            })
            .collect()
    } else if matches!(data_type, DataType::Null) {
        vec![Datum::Null; len]
    } else {
        (0..len)
            .map(|i| {
                if array.is_null(i) {
                    Ok(Datum::Null)
                } else {
                    array_value_to_string(array, i).map(Datum::Text)
                }
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(datums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BinaryOp;
    use arrow::array::{Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};

    fn create_test_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("variant", DataType::Utf8, false),
            Field::new("x", DataType::Int32, true),
            Field::new("y", DataType::Float64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["a", "a", "b", "b", "b"])),
                Arc::new(Int32Array::from(vec![Some(1), Some(3), Some(2), None, Some(6)])),
                Arc::new(Float64Array::from(vec![1.0, 1.0, 2.0, 2.0, 5.0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_render_literals() {
        assert_eq!(render_literal(1.0), "CAST(1.0 AS DOUBLE)");
        assert_eq!(render_literal(f64::NAN), "CAST('NaN' AS DOUBLE)");
        assert_eq!(render_literal(f64::NEG_INFINITY), "CAST('-inf' AS DOUBLE)");
    }

    #[test]
    fn test_query_rendering() {
        let source = DataFusionSource::from_sql(SessionContext::new(), "SELECT * FROM \"data\"")
            .group_by("variant")
            .unwrap()
            .project_with(vec![(
                "_demean__x".to_string(),
                ScalarExpr::column("x").sub(ScalarExpr::group_mean("x")),
            )])
            .unwrap();
        assert_eq!(
            source.query(),
            "SELECT *, (CAST(\"x\" AS DOUBLE) - AVG(CAST(\"x\" AS DOUBLE)) OVER (PARTITION BY \"variant\")) \
             AS \"_demean__x\" FROM (SELECT * FROM \"data\") AS \"_t0\""
        );

        let source = source
            .aggregate(vec![("_count".to_string(), Reduction::Count)])
            .unwrap();
        assert!(source.query().starts_with("SELECT \"variant\" AS \"variant\", COUNT(*) AS \"_count\""));
        assert!(source.query().ends_with("AS \"_t1\" GROUP BY \"variant\""));
        assert!(source.description().starts_with("DataFusion query: SELECT"));
    }

    #[test]
    fn test_operations_after_aggregate_are_rejected() {
        let source = DataFusionSource::from_sql(SessionContext::new(), "SELECT 1 AS \"x\"")
            .aggregate(vec![("_count".to_string(), Reduction::Count)])
            .unwrap();
        let err = source.clone().group_by("x").unwrap_err();
        assert!(matches!(err, AggregateError::NotSupported(_)));
        assert!(source.aggregate(vec![]).is_err());
    }

    #[tokio::test]
    async fn test_grouped_reduction() {
        let source = DataFusionSource::from_batch(create_test_batch()).unwrap();
        let rows = source
            .group_by("variant")
            .unwrap()
            .aggregate(vec![
                ("n".to_string(), Reduction::Count),
                ("mx".to_string(), Reduction::mean(ScalarExpr::column("x"))),
                (
                    "ratio".to_string(),
                    Reduction::binary(
                        BinaryOp::Div,
                        Reduction::sum(ScalarExpr::column("y")),
                        Reduction::Count,
                    ),
                ),
            ])
            .unwrap()
            .materialize()
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        let b = rows
            .iter()
            .find(|row| row.group() == Some(&GroupKey::from("b")))
            .unwrap();
        assert_eq!(b.count("n").unwrap(), 3);
        // AVG skips the null
        assert_eq!(b.float("mx").unwrap(), 4.0);
        assert_eq!(b.float("ratio").unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_unknown_column_is_a_datafusion_error() {
        let source = DataFusionSource::from_batch(create_test_batch()).unwrap();
        let err = source
            .aggregate(vec![("m".to_string(), Reduction::mean(ScalarExpr::column("nope")))])
            .unwrap()
            .materialize()
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::DataFusion(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn test_empty_ungrouped_aggregate_yields_one_row() {
        let source = DataFusionSource::from_sql(
            SessionContext::new(),
            "SELECT * FROM (SELECT CAST(1.0 AS DOUBLE) AS \"x\") AS \"s\" WHERE \"x\" > 5",
        );
        let rows = source
            .aggregate(vec![
                ("n".to_string(), Reduction::Count),
                ("m".to_string(), Reduction::mean(ScalarExpr::column("x"))),
            ])
            .unwrap()
            .materialize()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count("n").unwrap(), 0);
        assert_eq!(rows[0].get("m"), Some(&Datum::Null));
    }
}
