//! Combination of aggregates computed on independent samples.
//!
//! Means are pooled by weight; variances and covariances use the parallel
//! algorithm (Chan et al.), which adds a between-sample term to the pooled
//! within-sample sums of squares. The formulas are exact given the sufficient
//! statistics, so any merge tree over partitions reproduces the statistics of
//! the concatenated sample up to rounding.

use std::collections::BTreeMap;

use super::pair::VarPair;
use super::store::Aggregates;
use crate::error::{AggregateError, AggregateResult};

impl Aggregates {
    /// Aggregated statistics of the concatenation of two independent samples.
    ///
    /// Both sides must hold the same statistics. The count is kept only when both
    /// sides define it; merging any mean, variance or covariance needs both counts.
    /// A side with fewer than two observations contributes nothing to the
    /// within-sample sum of squares.
    ///
    /// ```rust
    /// use tea_aggregates::aggregates::Aggregates;
    ///
    /// # fn main() -> tea_aggregates::error::AggregateResult<()> {
    /// let a = Aggregates::builder().count(3).mean("x", 2.0).var("x", 1.0).build()?;
    /// let b = Aggregates::builder().count(4).mean("x", 5.5).var("x", 5.0 / 3.0).build()?;
    ///
    /// let ab = a.combine(&b)?;
    /// assert_eq!(ab.count()?, 7);
    /// assert!((ab.mean("x")? - 4.0).abs() < 1e-12);
    /// assert!((ab.var("x")? - 14.0 / 3.0).abs() < 1e-12);
    /// # Ok(())
    /// # }
    /// ```
    pub fn combine(&self, other: &Aggregates) -> AggregateResult<Aggregates> {
        check_no_extra_keys(self, other)?;

        let count = match (self.count_opt(), other.count_opt()) {
            (Some(left), Some(right)) => Some(left + right),
            _ => None,
        };

        let mean = self
            .means()
            .keys()
            .map(|col| Ok((col.clone(), combine_mean(self, other, col)?)))
            .collect::<AggregateResult<BTreeMap<_, _>>>()?;
        let var = self
            .variances()
            .keys()
            .map(|col| {
                let pair = VarPair::new(col.as_str(), col.as_str());
                let value = combine_comoment(self, other, &pair, |aggr| aggr.var(col))?;
                Ok((col.clone(), value))
            })
            .collect::<AggregateResult<BTreeMap<_, _>>>()?;
        let cov = self
            .covariances()
            .keys()
            .map(|pair| {
                let value = combine_comoment(self, other, pair, |aggr| {
                    aggr.cov(pair.left(), pair.right())
                })?;
                Ok((pair.clone(), value))
            })
            .collect::<AggregateResult<BTreeMap<_, _>>>()?;

        Ok(Aggregates::from_parts(count, mean, var, cov))
    }

    /// Merges aggregates of many independent partitions with a pairwise tree
    /// reduction.
    pub fn merge(states: Vec<Aggregates>) -> AggregateResult<Aggregates> {
        if states.is_empty() {
            return Err(AggregateError::incompatible("No aggregates to merge"));
        }

        let mut level = states;
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            let mut iter = level.into_iter();
            while let Some(left) = iter.next() {
                match iter.next() {
                    Some(right) => next.push(left.combine(&right)?),
                    None => next.push(left),
                }
            }
            level = next;
        }

        level
            .pop()
            .ok_or_else(|| AggregateError::incompatible("No aggregates to merge"))
    }

    fn count_opt(&self) -> Option<u64> {
        self.count().ok()
    }
}

fn check_no_extra_keys(left: &Aggregates, right: &Aggregates) -> AggregateResult<()> {
    let extra = right
        .means()
        .keys()
        .find(|col| !left.means().contains_key(*col))
        .map(|col| format!("mean of '{col}'"))
        .or_else(|| {
            right
                .variances()
                .keys()
                .find(|col| !left.variances().contains_key(*col))
                .map(|col| format!("variance of '{col}'"))
        })
        .or_else(|| {
            right
                .covariances()
                .keys()
                .find(|pair| !left.covariances().contains_key(*pair))
                .map(|pair| format!("covariance of '{pair}'"))
        });

    match extra {
        Some(what) => Err(AggregateError::incompatible(format!(
            "right-hand aggregates hold an extra {what}"
        ))),
        None => Ok(()),
    }
}

fn combine_mean(left: &Aggregates, right: &Aggregates, col: &str) -> AggregateResult<f64> {
    let (left_n, right_n) = (left.count()?, right.count()?);
    let total_n = left_n + right_n;
    if total_n == 0 {
        return Err(AggregateError::InsufficientCount {
            required: 1,
            actual: 0,
        });
    }

    let sum = weighted(left.mean(col)?, left_n) + weighted(right.mean(col)?, right_n);
    Ok(sum / total_n as f64)
}

/// Pooled co-moment of `pair` divided by `N - 1`.
fn combine_comoment<F>(
    left: &Aggregates,
    right: &Aggregates,
    pair: &VarPair,
    stat: F,
) -> AggregateResult<f64>
where
    F: Fn(&Aggregates) -> AggregateResult<f64>,
{
    let (left_n, right_n) = (left.count()?, right.count()?);
    let total_n = left_n + right_n;
    if total_n < 2 {
        return Err(AggregateError::InsufficientCount {
            required: 2,
            actual: total_n,
        });
    }

    let diff_left = left.mean(pair.left())? - right.mean(pair.left())?;
    let diff_right = left.mean(pair.right())? - right.mean(pair.right())?;

    let within = within_sum(stat(left)?, left_n) + within_sum(stat(right)?, right_n);
    let between = if left_n == 0 || right_n == 0 {
        0.0
    } else {
        diff_left * diff_right * left_n as f64 * right_n as f64 / total_n as f64
    };

    Ok((within + between) / (total_n - 1) as f64)
}

/// Sum of a sample's values; an empty sample's undefined mean is ignored.
fn weighted(mean: f64, n: u64) -> f64 {
    if n == 0 {
        0.0
    } else {
        mean * n as f64
    }
}

/// Sum of co-deviations of a single sample; exactly zero below two observations.
fn within_sum(value: f64, n: u64) -> f64 {
    if n < 2 {
        0.0
    } else {
        value * (n - 1) as f64
    }
}
