//! Error types for aggregate statistics.
//!
//! All fallible operations in this crate return [`AggregateResult`]. Errors raised
//! by a tabular backend (DataFusion, Arrow) are carried through transparently so
//! callers see the backend's own message, never a re-worded one.

use std::fmt;

use thiserror::Error;

/// Result type for aggregate operations.
pub type AggregateResult<T> = std::result::Result<T, AggregateError>;

/// The kind of statistic a lookup was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// Sample mean.
    Mean,
    /// Sample variance.
    Variance,
    /// Sample covariance.
    Covariance,
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatKind::Mean => "mean",
            StatKind::Variance => "variance",
            StatKind::Covariance => "covariance",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while reading, projecting or combining aggregates.
#[derive(Error, Debug)]
pub enum AggregateError {
    /// The sample size was requested from aggregates built without one.
    #[error("Count is undefined for these aggregates")]
    CountUndefined,

    /// A statistic was requested that was never computed.
    #[error("Sample {kind} not found for '{key}'")]
    KeyNotFound {
        /// Which statistic was looked up.
        kind: StatKind,
        /// Variable name, or `left, right` for covariances.
        key: String,
    },

    /// A merge needs more observations than the combined samples hold.
    #[error("Combined sample size {actual} is too small (at least {required} required)")]
    InsufficientCount {
        /// Minimal combined count for the statistic.
        required: u64,
        /// Combined count of both samples.
        actual: u64,
    },

    /// Two aggregate sets do not hold the same statistics.
    #[error("Incompatible aggregates: {0}")]
    IncompatibleAggregates(String),

    /// A column referenced by a query does not exist in the source.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound {
        /// The missing column.
        column: String,
    },

    /// The backend returned a value that cannot be used as a statistic.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The backend cannot perform the requested operation.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// A stored partition was requested that does not exist.
    #[error("Partition '{0}' not found")]
    PartitionNotFound(String),

    /// The backend returned no rows for an ungrouped aggregation.
    #[error("No data available for aggregation")]
    NoData,

    /// An identifier was rejected before being rendered into a query.
    #[error("Security error: {0}")]
    Security(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from file system operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from DataFusion query planning or execution.
    #[error(transparent)]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow computation.
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

impl AggregateError {
    /// Creates a key-not-found error for a single variable.
    pub fn key_not_found(kind: StatKind, key: impl Into<String>) -> Self {
        Self::KeyNotFound {
            kind,
            key: key.into(),
        }
    }

    /// Creates an incompatible-aggregates error with the given message.
    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::IncompatibleAggregates(msg.into())
    }

    /// Creates an invalid data error with the given message.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Creates a not-supported error with the given message.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Returns true if the error was raised by the tabular backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::DataFusion(_)
                | Self::Arrow(_)
                | Self::ColumnNotFound { .. }
                | Self::NotSupported(_)
        )
    }
}

impl From<serde_json::Error> for AggregateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
