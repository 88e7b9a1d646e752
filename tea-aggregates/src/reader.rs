//! Computing aggregates from a tabular source with push-down aggregation.
//!
//! Variances and covariances are computed in two passes to avoid the
//! cancellation of the naive `sum(x^2) - n * mean^2` formula:
//!
//! 1. Every variable with a requested variance or covariance is demeaned,
//!    `x - mean(x)`, with the mean taken per group.
//! 2. One grouped reduction computes the count, the requested means and
//!    `sum(d_a * d_b) / (count - 1)` for each variance (`a == b`) and
//!    covariance.
//!
//! Only positional aliases (`__tea_count`, `__tea_mean_0`, `__tea_var_1`,
//! `__tea_cov_0`, `__tea_demean_2`) are sent to the backend, so variable names
//! never have to be valid result aliases. Source columns must not use the
//! `__tea_` prefix; a backend rejects a projection that would shadow one.

use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::aggregates::{AggregateRequest, Aggregates, VarPair};
use crate::backend::{GroupKey, Reduction, Row, ScalarExpr, TabularSource};
use crate::error::{AggregateError, AggregateResult};

/// Aggregates keyed by group value, one entry per distinct group.
pub type GroupedAggregates = BTreeMap<GroupKey, Aggregates>;

const FIELD_PREFIX: &str = "__tea_";
const COUNT_FIELD: &str = "__tea_count";

/// Reads the requested statistics over the whole source.
///
/// An empty request returns empty aggregates without querying the backend.
/// Fails with [`AggregateError::NoData`] if the backend returns no row, and
/// with whatever error the backend raises for unknown columns.
#[instrument(skip(source, request), fields(
    source = %source.description(),
    means = request.mean_columns().len(),
    vars = request.var_columns().len(),
    covs = request.cov_pairs().len()
))]
pub async fn read_aggregates<S: TabularSource>(
    source: S,
    request: &AggregateRequest,
) -> AggregateResult<Aggregates> {
    if request.is_empty() {
        return Ok(Aggregates::default());
    }

    let plan = ReadPlan::new(request);
    let rows = plan.execute(source).await?;
    let row = rows.into_iter().next().ok_or(AggregateError::NoData)?;
    plan.aggregates(&row)
}

/// Reads the requested statistics separately for each value of `group_column`.
///
/// The result holds one entry per distinct group value the backend returns;
/// an empty source yields an empty map.
#[instrument(skip(source, request), fields(
    source = %source.description(),
    group_column = %group_column,
    means = request.mean_columns().len(),
    vars = request.var_columns().len(),
    covs = request.cov_pairs().len()
))]
pub async fn read_grouped_aggregates<S: TabularSource>(
    source: S,
    group_column: &str,
    request: &AggregateRequest,
) -> AggregateResult<GroupedAggregates> {
    let plan = ReadPlan::new(request);
    let rows = plan.execute(source.group_by(group_column)?).await?;

    let mut grouped = GroupedAggregates::new();
    for row in rows {
        let key = row.group().cloned().ok_or_else(|| {
            AggregateError::invalid_data(format!(
                "result row has no value for group column '{group_column}'"
            ))
        })?;
        grouped.insert(key, plan.aggregates(&row)?);
    }

    debug!(groups = grouped.len(), "Read grouped aggregates");
    Ok(grouped)
}

/// Positional layout of one read.
struct ReadPlan<'a> {
    request: &'a AggregateRequest,
    demean: BTreeMap<&'a str, String>,
}

impl<'a> ReadPlan<'a> {
    fn new(request: &'a AggregateRequest) -> Self {
        let demean = request
            .var_columns()
            .iter()
            .map(String::as_str)
            .chain(request.cov_pairs().iter().flat_map(|pair| pair.names()))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, format!("{FIELD_PREFIX}demean_{i}")))
            .collect();
        Self { request, demean }
    }

    async fn execute<S: TabularSource>(&self, source: S) -> AggregateResult<Vec<Row>> {
        let projection = self.projection();
        let reductions = self.reductions();
        debug!(
            demeaned = projection.len(),
            reductions = reductions.len(),
            "Pushing aggregation to backend"
        );

        let source = if projection.is_empty() {
            source
        } else {
            source.project_with(projection)?
        };
        source.aggregate(reductions)?.materialize().await
    }

    fn projection(&self) -> Vec<(String, ScalarExpr)> {
        self.demean
            .iter()
            .map(|(name, alias)| {
                let expr = ScalarExpr::column(*name).sub(ScalarExpr::group_mean(*name));
                (alias.clone(), expr)
            })
            .collect()
    }

    fn reductions(&self) -> Vec<(String, Reduction)> {
        let mut reductions = Vec::new();
        if self.request.has_count() {
            reductions.push((COUNT_FIELD.to_string(), Reduction::Count));
        }
        for (i, name) in self.request.mean_columns().iter().enumerate() {
            reductions.push((mean_field(i), Reduction::mean(ScalarExpr::column(name))));
        }
        for (i, name) in self.request.var_columns().iter().enumerate() {
            reductions.push((var_field(i), self.comoment(name, name)));
        }
        for (i, pair) in self.request.cov_pairs().iter().enumerate() {
            reductions.push((cov_field(i), self.comoment(pair.left(), pair.right())));
        }
        reductions
    }

    /// `sum(d_left * d_right) / (count - 1)`
    fn comoment(&self, left: &str, right: &str) -> Reduction {
        let demeaned = |name: &str| ScalarExpr::column(self.demean[name].as_str());
        Reduction::sum(demeaned(left).mul(demeaned(right)))
            .div(Reduction::Count.sub(Reduction::Literal(1.0)))
    }

    fn aggregates(&self, row: &Row) -> AggregateResult<Aggregates> {
        let count = if self.request.has_count() {
            Some(row.count(COUNT_FIELD)?)
        } else {
            None
        };

        let mut mean = BTreeMap::new();
        for (i, name) in self.request.mean_columns().iter().enumerate() {
            mean.insert(name.clone(), row.float(&mean_field(i))?);
        }
        let mut var = BTreeMap::new();
        for (i, name) in self.request.var_columns().iter().enumerate() {
            var.insert(name.clone(), row.float(&var_field(i))?);
        }
        let mut cov: BTreeMap<VarPair, f64> = BTreeMap::new();
        for (i, pair) in self.request.cov_pairs().iter().enumerate() {
            cov.insert(pair.clone(), row.float(&cov_field(i))?);
        }

        Ok(Aggregates::from_parts(count, mean, var, cov))
    }
}

fn mean_field(i: usize) -> String {
    format!("{FIELD_PREFIX}mean_{i}")
}

fn var_field(i: usize) -> String {
    format!("{FIELD_PREFIX}var_{i}")
}

fn cov_field(i: usize) -> String {
    format!("{FIELD_PREFIX}cov_{i}")
}
