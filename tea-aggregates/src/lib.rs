//! # tea-aggregates - Mergeable statistics for experiment analysis
//!
//! `tea-aggregates` computes the sufficient statistics an A/B test needs
//! (sample count, means, variances and covariances) by pushing the aggregation
//! down to a query engine, and then does everything else on those few numbers:
//! ratio-metric variances by the Delta method, projection to a subset, and exact
//! merging of statistics from independent partitions.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{Float64Array, RecordBatch, StringArray};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use tea_aggregates::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let schema = Arc::new(Schema::new(vec![
//!     Field::new("variant", DataType::Utf8, false),
//!     Field::new("orders", DataType::Float64, false),
//!     Field::new("sessions", DataType::Float64, false),
//! ]));
//! let batch = RecordBatch::try_new(
//!     schema,
//!     vec![
//!         Arc::new(StringArray::from(vec!["control", "control", "control", "treatment", "treatment"])),
//!         Arc::new(Float64Array::from(vec![1.0, 0.0, 2.0, 2.0, 3.0])),
//!         Arc::new(Float64Array::from(vec![2.0, 1.0, 3.0, 2.0, 4.0])),
//!     ],
//! )?;
//!
//! let request = AggregateRequest::new()
//!     .with_var("orders")
//!     .with_var("sessions")
//!     .with_cov("orders", "sessions");
//! let by_variant =
//!     read_grouped_aggregates(DataFusionSource::from_batch(batch)?, "variant", &request).await?;
//!
//! let control = &by_variant[&GroupKey::from("control")];
//! let orders_per_session = control.mean("orders")? / control.mean("sessions")?;
//! let variance = control.ratio_var("orders", "sessions")? / control.count()? as f64;
//! assert!(orders_per_session > 0.0 && variance.is_finite());
//!
//! // Statistics of both variants together, without another query.
//! let all = Aggregates::merge(by_variant.into_values().collect())?;
//! assert_eq!(all.count()?, 5);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`aggregates`]: the [`Aggregates`](aggregates::Aggregates) value and its
//!   algebra (filter, ratio statistics, combine).
//! - [`reader`]: two-pass computation of aggregates on a backend.
//! - [`backend`]: the [`TabularSource`](backend::TabularSource) capability
//!   trait with DataFusion and in-memory implementations.
//! - [`partitions`]: persisting per-partition aggregates and merging them.
//! - [`config`], [`logging`], [`error`], [`security`]: supporting pieces.

pub mod aggregates;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod partitions;
pub mod prelude;
pub mod reader;
pub mod security;
