//! Canonical unordered pair of variable names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An unordered pair of variable names used as a covariance key.
///
/// The names are stored in lexicographic order, so `VarPair::new("b", "a")` and
/// `VarPair::new("a", "b")` are the same key.
///
/// # Example
///
/// ```rust
/// use tea_aggregates::aggregates::VarPair;
///
/// let pair = VarPair::new("sessions", "orders");
/// assert_eq!(pair.left(), "orders");
/// assert_eq!(pair, VarPair::new("orders", "sessions"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct VarPair {
    left: String,
    right: String,
}

impl VarPair {
    /// Creates a pair, sorting the two names.
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { left: a, right: b }
        } else {
            Self { left: b, right: a }
        }
    }

    /// The lexicographically smaller name.
    pub fn left(&self) -> &str {
        &self.left
    }

    /// The lexicographically larger name.
    pub fn right(&self) -> &str {
        &self.right
    }

    /// Returns true if either side of the pair is `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.left == name || self.right == name
    }

    /// Returns true for a pair of a variable with itself.
    pub fn is_diagonal(&self) -> bool {
        self.left == self.right
    }

    /// Both names, in canonical order.
    pub fn names(&self) -> [&str; 2] {
        [&self.left, &self.right]
    }
}

impl fmt::Display for VarPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.left, self.right)
    }
}

impl From<(String, String)> for VarPair {
    fn from((a, b): (String, String)) -> Self {
        Self::new(a, b)
    }
}

impl From<(&str, &str)> for VarPair {
    fn from((a, b): (&str, &str)) -> Self {
        Self::new(a, b)
    }
}

impl From<VarPair> for (String, String) {
    fn from(pair: VarPair) -> Self {
        (pair.left, pair.right)
    }
}
