//! The immutable aggregate statistics value.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use super::operand::Operand;
use super::pair::VarPair;
use crate::error::{AggregateError, AggregateResult, StatKind};

/// Aggregated statistics of a sample: count, means, variances and covariances.
///
/// Variances and covariances are sample statistics with Bessel's correction
/// (divisor `n - 1`). Covariances are keyed by [`VarPair`], so `cov(a, b)` and
/// `cov(b, a)` always resolve to the same value.
///
/// An `Aggregates` value is never mutated after construction. Projection
/// ([`Aggregates::filter`]) and merging ([`Aggregates::combine`]) produce new
/// values.
///
/// # Example
///
/// ```rust
/// use tea_aggregates::aggregates::{Aggregates, Operand};
///
/// # fn main() -> tea_aggregates::error::AggregateResult<()> {
/// let aggr = Aggregates::builder()
///     .count(10)
///     .mean("x", 2.0)
///     .mean("y", 4.0)
///     .var("x", 1.0)
///     .var("y", 2.0)
///     .cov("y", "x", 0.5)
///     .build()?;
///
/// assert_eq!(aggr.cov("x", "y")?, 0.5);
/// assert_eq!(aggr.mean(Operand::One)?, 1.0);
/// assert_eq!(aggr.ratio_var("x", "y")?, 0.0625);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "AggregatesRepr", into = "AggregatesRepr")]
pub struct Aggregates {
    count: Option<u64>,
    mean: BTreeMap<String, f64>,
    var: BTreeMap<String, f64>,
    cov: BTreeMap<VarPair, f64>,
}

impl Aggregates {
    /// Creates aggregates from raw maps.
    ///
    /// Fails with [`AggregateError::KeyNotFound`] if a variable with a variance or
    /// covariance has no mean, and with [`AggregateError::CountUndefined`] if
    /// variances or covariances are given without a count.
    pub fn new(
        count: Option<u64>,
        mean: BTreeMap<String, f64>,
        var: BTreeMap<String, f64>,
        cov: impl IntoIterator<Item = (VarPair, f64)>,
    ) -> AggregateResult<Self> {
        let aggr = Self::from_parts(count, mean, var, cov.into_iter().collect());
        aggr.validate()?;
        Ok(aggr)
    }

    /// Starts building aggregates value by value.
    pub fn builder() -> AggregatesBuilder {
        AggregatesBuilder::default()
    }

    pub(crate) fn from_parts(
        count: Option<u64>,
        mean: BTreeMap<String, f64>,
        var: BTreeMap<String, f64>,
        cov: BTreeMap<VarPair, f64>,
    ) -> Self {
        Self {
            count,
            mean,
            var,
            cov,
        }
    }

    fn validate(&self) -> AggregateResult<()> {
        if self.count.is_none() && !(self.var.is_empty() && self.cov.is_empty()) {
            return Err(AggregateError::CountUndefined);
        }
        let referenced = self
            .var
            .keys()
            .map(String::as_str)
            .chain(self.cov.keys().flat_map(|pair| pair.names()));
        for name in referenced {
            if !self.mean.contains_key(name) {
                return Err(AggregateError::key_not_found(StatKind::Mean, name));
            }
        }
        Ok(())
    }

    /// Sample size.
    ///
    /// Fails with [`AggregateError::CountUndefined`] if the aggregates were built
    /// without a count.
    pub fn count(&self) -> AggregateResult<u64> {
        self.count.ok_or(AggregateError::CountUndefined)
    }

    /// Returns true if the sample size is defined.
    pub fn has_count(&self) -> bool {
        self.count.is_some()
    }

    /// Sample mean. The constant operand has mean `1`.
    pub fn mean<'a>(&self, key: impl Into<Operand<'a>>) -> AggregateResult<f64> {
        match key.into() {
            Operand::One => Ok(1.0),
            Operand::Variable(name) => self
                .mean
                .get(name)
                .copied()
                .ok_or_else(|| AggregateError::key_not_found(StatKind::Mean, name)),
        }
    }

    /// Sample variance. The constant operand has variance `0`.
    pub fn var<'a>(&self, key: impl Into<Operand<'a>>) -> AggregateResult<f64> {
        match key.into() {
            Operand::One => Ok(0.0),
            Operand::Variable(name) => self
                .var
                .get(name)
                .copied()
                .ok_or_else(|| AggregateError::key_not_found(StatKind::Variance, name)),
        }
    }

    /// Sample covariance. Any covariance with the constant operand is `0`.
    pub fn cov<'a, 'b>(
        &self,
        left: impl Into<Operand<'a>>,
        right: impl Into<Operand<'b>>,
    ) -> AggregateResult<f64> {
        match (left.into(), right.into()) {
            (Operand::Variable(left), Operand::Variable(right)) => {
                let pair = VarPair::new(left, right);
                self.cov
                    .get(&pair)
                    .copied()
                    .ok_or_else(|| AggregateError::key_not_found(StatKind::Covariance, pair.to_string()))
            }
            _ => Ok(0.0),
        }
    }

    /// All stored means.
    pub fn means(&self) -> &BTreeMap<String, f64> {
        &self.mean
    }

    /// All stored variances.
    pub fn variances(&self) -> &BTreeMap<String, f64> {
        &self.var
    }

    /// All stored covariances.
    pub fn covariances(&self) -> &BTreeMap<VarPair, f64> {
        &self.cov
    }

    /// Returns true if no statistic at all is stored.
    pub fn is_empty(&self) -> bool {
        self.count.is_none() && self.mean.is_empty() && self.var.is_empty() && self.cov.is_empty()
    }
}

/// Builder for [`Aggregates`].
#[derive(Debug, Clone, Default)]
pub struct AggregatesBuilder {
    count: Option<u64>,
    mean: BTreeMap<String, f64>,
    var: BTreeMap<String, f64>,
    cov: BTreeMap<VarPair, f64>,
}

impl AggregatesBuilder {
    /// Sets the sample size.
    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets the mean of a variable.
    pub fn mean(mut self, name: impl Into<String>, value: f64) -> Self {
        self.mean.insert(name.into(), value);
        self
    }

    /// Sets the variance of a variable.
    pub fn var(mut self, name: impl Into<String>, value: f64) -> Self {
        self.var.insert(name.into(), value);
        self
    }

    /// Sets the covariance of a pair of variables, in either order.
    pub fn cov(mut self, left: impl Into<String>, right: impl Into<String>, value: f64) -> Self {
        self.cov.insert(VarPair::new(left, right), value);
        self
    }

    /// Builds and validates the aggregates.
    pub fn build(self) -> AggregateResult<Aggregates> {
        Aggregates::new(self.count, self.mean, self.var, self.cov)
    }
}

/// Serialized form: covariances as a list since JSON keys must be strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AggregatesRepr {
    count: Option<u64>,
    #[serde(default)]
    mean: BTreeMap<String, StatValue>,
    #[serde(default)]
    var: BTreeMap<String, StatValue>,
    #[serde(default)]
    cov: Vec<CovEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CovEntry {
    left: String,
    right: String,
    value: StatValue,
}

/// A statistic as written to JSON.
///
/// JSON numbers cannot hold NaN or infinities, so those are written as the
/// strings `"NaN"`, `"inf"` and `"-inf"`. A `null` reads back as NaN, which is
/// how `serde_json` writes non-finite floats on its own.
#[derive(Debug, Clone, Copy)]
struct StatValue(f64);

impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            v if v.is_finite() => serializer.serialize_f64(v),
            v if v.is_nan() => serializer.serialize_str("NaN"),
            v if v > 0.0 => serializer.serialize_str("inf"),
            _ => serializer.serialize_str("-inf"),
        }
    }
}

impl<'de> Deserialize<'de> for StatValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        let value = match Option::<Raw>::deserialize(deserializer)? {
            None => f64::NAN,
            Some(Raw::Number(v)) => v,
            Some(Raw::Text(text)) => match text.as_str() {
                "NaN" => f64::NAN,
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                other => {
                    return Err(de::Error::custom(format!(
                        "invalid statistic value '{other}'"
                    )))
                }
            },
        };
        Ok(StatValue(value))
    }
}

fn to_repr_map(values: BTreeMap<String, f64>) -> BTreeMap<String, StatValue> {
    values.into_iter().map(|(k, v)| (k, StatValue(v))).collect()
}

fn from_repr_map(values: BTreeMap<String, StatValue>) -> BTreeMap<String, f64> {
    values.into_iter().map(|(k, v)| (k, v.0)).collect()
}

impl From<Aggregates> for AggregatesRepr {
    fn from(aggr: Aggregates) -> Self {
        let cov = aggr
            .cov
            .into_iter()
            .map(|(pair, value)| {
                let (left, right) = pair.into();
                CovEntry {
                    left,
                    right,
                    value: StatValue(value),
                }
            })
            .collect();
        Self {
            count: aggr.count,
            mean: to_repr_map(aggr.mean),
            var: to_repr_map(aggr.var),
            cov,
        }
    }
}

impl TryFrom<AggregatesRepr> for Aggregates {
    type Error = AggregateError;

    fn try_from(repr: AggregatesRepr) -> AggregateResult<Self> {
        let mut cov = BTreeMap::new();
        for entry in repr.cov {
            let pair = VarPair::new(entry.left, entry.right);
            if cov.contains_key(&pair) {
                return Err(AggregateError::invalid_data(format!(
                    "duplicate covariance entry for ({pair})"
                )));
            }
            cov.insert(pair, entry.value.0);
        }
        Aggregates::new(
            repr.count,
            from_repr_map(repr.mean),
            from_repr_map(repr.var),
            cov,
        )
    }
}
