//! Aggregated statistics and their algebra.
//!
//! [`Aggregates`] holds a sample's count, means, variances and covariances. On
//! top of it this module provides:
//!
//! - **Projection** ([`Aggregates::filter`]): keep a normalized subset described by
//!   an [`AggregateRequest`].
//! - **Ratio statistics** ([`Aggregates::ratio_var`], [`Aggregates::ratio_cov`]):
//!   Delta-method variance and covariance of `numerator / denominator` metrics.
//! - **Combination** ([`Aggregates::combine`], [`Aggregates::merge`]): statistics of
//!   the concatenation of independent samples, without revisiting raw rows.
//!
//! ## Example
//!
//! ```rust
//! use tea_aggregates::aggregates::{AggregateRequest, Aggregates, Operand};
//!
//! # fn main() -> tea_aggregates::error::AggregateResult<()> {
//! let control = Aggregates::builder()
//!     .count(3)
//!     .mean("orders", 1.0)
//!     .mean("sessions", 2.0)
//!     .var("orders", 1.0)
//!     .var("sessions", 1.0)
//!     .cov("orders", "sessions", 0.5)
//!     .build()?;
//!
//! // Orders per session, and orders per user (a ratio with denominator one).
//! let per_session = control.ratio_var("orders", "sessions")?;
//! let per_user = control.ratio_var("orders", Operand::One)?;
//! assert_eq!(per_user, control.var("orders")?);
//! assert!(per_session > 0.0);
//!
//! let means_only = control.filter(&AggregateRequest::new().with_mean("orders"))?;
//! assert_eq!(means_only.mean("orders")?, 1.0);
//! # Ok(())
//! # }
//! ```

mod combine;
mod filter;
mod operand;
mod pair;
mod ratio;
mod request;
mod store;

pub use operand::Operand;
pub use pair::VarPair;
pub use request::AggregateRequest;
pub use store::{Aggregates, AggregatesBuilder};
