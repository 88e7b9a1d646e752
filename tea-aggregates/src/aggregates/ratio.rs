//! Delta-method variance and covariance of ratio metrics.
//!
//! Both estimators use a first-order Taylor expansion around the means. Any
//! argument may be [`Operand::One`], which turns a ratio into a plain metric.
//! A zero denominator mean is not special-cased and yields IEEE infinities or
//! NaN.
//!
//! References:
//! - [Delta method](https://en.wikipedia.org/wiki/Delta_method)
//! - [Taylor expansions for the moments of functions of random variables](https://en.wikipedia.org/wiki/Taylor_expansions_for_the_moments_of_functions_of_random_variables)

use super::operand::Operand;
use super::store::Aggregates;
use crate::error::AggregateResult;

impl Aggregates {
    /// Sample variance of `numer / denom`.
    ///
    /// `(Var(X) - 2 Cov(X, Y) E[X] / E[Y] + Var(Y) E[X]^2 / E[Y]^2) / E[Y]^2`
    pub fn ratio_var<'a, 'b>(
        &self,
        numer: impl Into<Operand<'a>>,
        denom: impl Into<Operand<'b>>,
    ) -> AggregateResult<f64> {
        let (numer, denom) = (numer.into(), denom.into());
        let numer_mean = self.mean(numer)?;
        let denom_mean = self.mean(denom)?;
        let denom_mean_sq = denom_mean * denom_mean;

        Ok((self.var(numer)? - 2.0 * self.cov(numer, denom)? * numer_mean / denom_mean
            + self.var(denom)? * numer_mean * numer_mean / denom_mean_sq)
            / denom_mean_sq)
    }

    /// Sample covariance of `left_numer / left_denom` and `right_numer / right_denom`.
    ///
    /// `(Cov(X1, X2) - Cov(X1, Y2) r2 - Cov(Y1, X2) r1 + Cov(Y1, Y2) r1 r2) / (E[Y1] E[Y2])`
    /// where `r1 = E[X1] / E[Y1]` and `r2 = E[X2] / E[Y2]`.
    pub fn ratio_cov<'a, 'b, 'c, 'd>(
        &self,
        left_numer: impl Into<Operand<'a>>,
        left_denom: impl Into<Operand<'b>>,
        right_numer: impl Into<Operand<'c>>,
        right_denom: impl Into<Operand<'d>>,
    ) -> AggregateResult<f64> {
        let (left_numer, left_denom) = (left_numer.into(), left_denom.into());
        let (right_numer, right_denom) = (right_numer.into(), right_denom.into());

        let left_denom_mean = self.mean(left_denom)?;
        let right_denom_mean = self.mean(right_denom)?;
        let left_ratio = self.mean(left_numer)? / left_denom_mean;
        let right_ratio = self.mean(right_numer)? / right_denom_mean;

        Ok((self.cov(left_numer, right_numer)?
            - self.cov(left_numer, right_denom)? * right_ratio
            - self.cov(left_denom, right_numer)? * left_ratio
            + self.cov(left_denom, right_denom)? * left_ratio * right_ratio)
            / left_denom_mean
            / right_denom_mean)
    }
}
