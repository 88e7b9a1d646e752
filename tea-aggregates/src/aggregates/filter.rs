//! Projection of aggregates onto a requested subset of statistics.

use std::collections::BTreeMap;

use super::request::AggregateRequest;
use super::store::Aggregates;
use crate::error::AggregateResult;

impl Aggregates {
    /// Returns new aggregates holding exactly the statistics of `request`.
    ///
    /// Values are copied from `self`. Fails with
    /// [`AggregateError::KeyNotFound`](crate::error::AggregateError::KeyNotFound)
    /// or [`AggregateError::CountUndefined`](crate::error::AggregateError::CountUndefined)
    /// if `self` lacks a requested statistic. Filtering twice with the same request
    /// yields the same value.
    ///
    /// ```rust
    /// use tea_aggregates::aggregates::{AggregateRequest, Aggregates};
    ///
    /// # fn main() -> tea_aggregates::error::AggregateResult<()> {
    /// let aggr = Aggregates::builder()
    ///     .count(5)
    ///     .mean("x", 1.0)
    ///     .mean("y", 2.0)
    ///     .var("x", 0.5)
    ///     .build()?;
    ///
    /// let only_y = aggr.filter(&AggregateRequest::new().with_mean("y"))?;
    /// assert!(!only_y.has_count());
    /// assert_eq!(only_y.means().len(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn filter(&self, request: &AggregateRequest) -> AggregateResult<Aggregates> {
        let count = if request.has_count() {
            Some(self.count()?)
        } else {
            None
        };

        let mean = request
            .mean_columns()
            .iter()
            .map(|name| Ok((name.clone(), self.mean(name)?)))
            .collect::<AggregateResult<BTreeMap<_, _>>>()?;
        let var = request
            .var_columns()
            .iter()
            .map(|name| Ok((name.clone(), self.var(name)?)))
            .collect::<AggregateResult<BTreeMap<_, _>>>()?;
        let cov = request
            .cov_pairs()
            .iter()
            .map(|pair| Ok((pair.clone(), self.cov(pair.left(), pair.right())?)))
            .collect::<AggregateResult<BTreeMap<_, _>>>()?;

        Ok(Aggregates::from_parts(count, mean, var, cov))
    }
}

#[cfg(test)]
mod tests {
    use crate::aggregates::{AggregateRequest, Aggregates};
    use crate::error::{AggregateError, StatKind};

    fn full() -> Aggregates {
        Aggregates::builder()
            .count(7)
            .mean("a", 1.0)
            .mean("b", 2.0)
            .mean("c", 3.0)
            .var("a", 0.1)
            .var("b", 0.2)
            .cov("a", "b", 0.01)
            .cov("b", "c", 0.02)
            .build()
            .unwrap()
    }

    #[test]
    fn test_filter_keeps_requested_subset() {
        let request = AggregateRequest::new().with_var("a").with_mean("c");
        let filtered = full().filter(&request).unwrap();

        assert_eq!(filtered.count().unwrap(), 7);
        assert_eq!(filtered.means().len(), 2);
        assert_eq!(filtered.variances().len(), 1);
        assert!(filtered.covariances().is_empty());
        assert_eq!(filtered.var("a").unwrap(), 0.1);
        assert!(filtered.var("b").is_err());
    }

    #[test]
    fn test_filter_reverse_pair_order() {
        let request = AggregateRequest::new().with_cov("c", "b");
        let filtered = full().filter(&request).unwrap();
        assert_eq!(filtered.cov("b", "c").unwrap(), 0.02);
        assert_eq!(filtered.mean("b").unwrap(), 2.0);
        assert_eq!(filtered.mean("c").unwrap(), 3.0);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let request = AggregateRequest::new().with_cov("a", "b").with_var("b");
        let once = full().filter(&request).unwrap();
        let twice = once.filter(&request).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_missing_statistic() {
        let request = AggregateRequest::new().with_var("c");
        assert!(matches!(
            full().filter(&request),
            Err(AggregateError::KeyNotFound {
                kind: StatKind::Variance,
                ..
            })
        ));
    }

    #[test]
    fn test_filter_count_undefined() {
        let aggr = Aggregates::builder().mean("x", 1.0).build().unwrap();
        let request = AggregateRequest::new().with_count();
        assert!(matches!(
            aggr.filter(&request),
            Err(AggregateError::CountUndefined)
        ));
    }
}
