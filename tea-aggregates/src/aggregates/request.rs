//! Normalized requests for aggregate statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::pair::VarPair;
use super::store::Aggregates;

/// The set of statistics to read from a source or keep in a projection.
///
/// A request is normalized at all times:
/// - the count is requested whenever a variance or covariance is, since both
///   divide by `n - 1`;
/// - every variable referenced by a variance or covariance also has its mean
///   requested, since both need demeaned values;
/// - variances and covariances are deduplicated, covariance pairs are
///   unordered.
///
/// # Example
///
/// ```rust
/// use tea_aggregates::aggregates::AggregateRequest;
///
/// let request = AggregateRequest::new()
///     .with_var("revenue")
///     .with_cov("orders", "revenue")
///     .with_cov("revenue", "orders");
///
/// assert!(request.has_count());
/// assert_eq!(request.mean_columns().len(), 2);
/// assert_eq!(request.cov_pairs().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRequest {
    has_count: bool,
    mean: BTreeSet<String>,
    var: BTreeSet<String>,
    cov: BTreeSet<VarPair>,
}

impl AggregateRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a normalized request from its four parts.
    pub fn from_parts<M, V, C, P>(has_count: bool, means: M, vars: V, covs: C) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
        C: IntoIterator<Item = P>,
        P: Into<VarPair>,
    {
        let request = Self::new().with_means(means).with_vars(vars).with_covs(covs);
        if has_count {
            request.with_count()
        } else {
            request
        }
    }

    /// Describes exactly the statistics held by `aggr`.
    pub fn of(aggr: &Aggregates) -> Self {
        Self::from_parts(
            aggr.has_count(),
            aggr.means().keys().cloned(),
            aggr.variances().keys().cloned(),
            aggr.covariances().keys().cloned(),
        )
    }

    /// Requests the sample size.
    pub fn with_count(mut self) -> Self {
        self.has_count = true;
        self
    }

    /// Requests the mean of a variable.
    pub fn with_mean(mut self, name: impl Into<String>) -> Self {
        self.mean.insert(name.into());
        self
    }

    /// Requests the means of several variables.
    pub fn with_means<I>(self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        names.into_iter().fold(self, |req, name| req.with_mean(name))
    }

    /// Requests the variance of a variable, along with its mean and the count.
    pub fn with_var(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.has_count = true;
        self.mean.insert(name.clone());
        self.var.insert(name);
        self
    }

    /// Requests the variances of several variables.
    pub fn with_vars<I>(self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        names.into_iter().fold(self, |req, name| req.with_var(name))
    }

    /// Requests the covariance of a pair, along with both means and the count.
    pub fn with_cov(self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.with_pair(VarPair::new(left, right))
    }

    /// Requests the covariances of several pairs.
    pub fn with_covs<I, P>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<VarPair>,
    {
        pairs
            .into_iter()
            .fold(self, |req, pair| req.with_pair(pair.into()))
    }

    fn with_pair(mut self, pair: VarPair) -> Self {
        self.has_count = true;
        for name in pair.names() {
            self.mean.insert(name.to_string());
        }
        self.cov.insert(pair);
        self
    }

    /// Whether the count is requested.
    pub fn has_count(&self) -> bool {
        self.has_count
    }

    /// Variables whose means are requested.
    pub fn mean_columns(&self) -> &BTreeSet<String> {
        &self.mean
    }

    /// Variables whose variances are requested.
    pub fn var_columns(&self) -> &BTreeSet<String> {
        &self.var
    }

    /// Requested covariance pairs.
    pub fn cov_pairs(&self) -> &BTreeSet<VarPair> {
        &self.cov
    }

    /// Variables that need a demeaned column to compute variances or covariances.
    pub fn demean_columns(&self) -> BTreeSet<String> {
        self.var
            .iter()
            .cloned()
            .chain(
                self.cov
                    .iter()
                    .flat_map(|pair| pair.names().map(str::to_string)),
            )
            .collect()
    }

    /// Returns true if nothing is requested.
    pub fn is_empty(&self) -> bool {
        !self.has_count && self.mean.is_empty()
    }
}
