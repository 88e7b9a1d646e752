//! Optional variable references for ratio-style lookups.

/// A variable reference that may stand for the constant `1`.
///
/// Ratio metrics are `numerator / denominator`; a plain metric is a ratio whose
/// denominator is the constant one. Lookups through [`Operand::One`] resolve to
/// `mean = 1`, `variance = 0` and `covariance = 0` without touching the stored maps.
///
/// ```rust
/// use tea_aggregates::aggregates::Operand;
///
/// assert_eq!(Operand::from("orders"), Operand::Variable("orders"));
/// assert_eq!(Operand::from(None::<&str>), Operand::One);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand<'a> {
    /// A named variable.
    Variable(&'a str),
    /// The constant one.
    One,
}

impl<'a> Operand<'a> {
    /// Returns the variable name, or `None` for the constant.
    pub fn name(&self) -> Option<&'a str> {
        match self {
            Operand::Variable(name) => Some(name),
            Operand::One => None,
        }
    }
}

impl<'a> From<&'a str> for Operand<'a> {
    fn from(name: &'a str) -> Self {
        Operand::Variable(name)
    }
}

impl<'a> From<&'a String> for Operand<'a> {
    fn from(name: &'a String) -> Self {
        Operand::Variable(name.as_str())
    }
}

impl<'a> From<Option<&'a str>> for Operand<'a> {
    fn from(name: Option<&'a str>) -> Self {
        name.map_or(Operand::One, Operand::Variable)
    }
}
