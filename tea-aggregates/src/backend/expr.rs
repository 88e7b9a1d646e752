//! Backend-neutral expressions for derived columns and reductions.

use std::fmt;

/// Arithmetic operator shared by row-level and reduction expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Floating-point division; a zero divisor yields IEEE infinities or NaN.
    Div,
}

impl BinaryOp {
    /// SQL spelling of the operator.
    pub fn sql(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Applies the operator to two numbers.
    pub fn apply(&self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// A row-level expression over existing columns.
///
/// ```rust
/// use tea_aggregates::backend::ScalarExpr;
///
/// // x - mean(x) within the current group
/// let demeaned = ScalarExpr::column("x").sub(ScalarExpr::group_mean("x"));
/// assert_eq!(demeaned.columns(), vec!["x"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr {
    /// Value of a column, as a float.
    Column(String),
    /// A constant.
    Literal(f64),
    /// Mean of a column over the rows of the current group (all rows when
    /// ungrouped), broadcast to every row of that group.
    GroupMean(String),
    /// Arithmetic on two expressions.
    Binary {
        op: BinaryOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },
}

impl ScalarExpr {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn literal(value: f64) -> Self {
        Self::Literal(value)
    }

    pub fn group_mean(name: impl Into<String>) -> Self {
        Self::GroupMean(name.into())
    }

    pub fn binary(op: BinaryOp, left: ScalarExpr, right: ScalarExpr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: ScalarExpr) -> Self {
        Self::binary(BinaryOp::Sub, self, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, other: ScalarExpr) -> Self {
        Self::binary(BinaryOp::Mul, self, other)
    }

    /// Columns the expression reads, in order of first appearance.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ScalarExpr::Column(name) | ScalarExpr::GroupMean(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            ScalarExpr::Literal(_) => {}
            ScalarExpr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
        }
    }
}

/// A reduction over the rows of each group.
///
/// ```rust
/// use tea_aggregates::backend::{Reduction, ScalarExpr};
///
/// // sum(d * d) / (count - 1)
/// let d = ScalarExpr::column("d");
/// let var = Reduction::sum(d.clone().mul(d)).div(Reduction::Count.sub(Reduction::Literal(1.0)));
/// assert!(matches!(var, Reduction::Binary { .. }));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// Number of rows in the group, nulls included.
    Count,
    /// Mean of the non-null values of an expression.
    Mean(ScalarExpr),
    /// Sum of the non-null values of an expression.
    Sum(ScalarExpr),
    /// A constant.
    Literal(f64),
    /// Arithmetic on two reductions.
    Binary {
        op: BinaryOp,
        left: Box<Reduction>,
        right: Box<Reduction>,
    },
}

impl Reduction {
    pub fn mean(expr: ScalarExpr) -> Self {
        Self::Mean(expr)
    }

    pub fn sum(expr: ScalarExpr) -> Self {
        Self::Sum(expr)
    }

    pub fn binary(op: BinaryOp, left: Reduction, right: Reduction) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: Reduction) -> Self {
        Self::binary(BinaryOp::Sub, self, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, other: Reduction) -> Self {
        Self::binary(BinaryOp::Div, self, other)
    }

    /// Columns the reduction reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Reduction::Count | Reduction::Literal(_) => Vec::new(),
            Reduction::Mean(expr) | Reduction::Sum(expr) => expr.columns(),
            Reduction::Binary { left, right, .. } => {
                let mut columns = left.columns();
                for column in right.columns() {
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
                columns
            }
        }
    }
}
