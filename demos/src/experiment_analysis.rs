//! Example comparing two variants of an experiment on a ratio metric.
//!
//! Aggregates are read once per variant with a single grouped query; the
//! Delta-method variance of "orders per session" and a two-sample z statistic
//! are then computed from the aggregates alone.

use datafusion::prelude::*;
use tea_aggregates::logging::setup::{init_logging, LoggingConfig};
use tea_aggregates::prelude::*;
use tea_aggregates_demos::experiment_batch;

/// Mean and standard error of `orders / sessions` in one variant.
fn orders_per_session(aggr: &Aggregates) -> AggregateResult<(f64, f64)> {
    let value = aggr.mean("orders")? / aggr.mean("sessions")?;
    let std_err = (aggr.ratio_var("orders", "sessions")? / aggr.count()? as f64).sqrt();
    Ok((value, std_err))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::with_queries())?;

    println!("=== Ratio Metric Experiment Analysis ===\n");

    let batch = experiment_batch(
        &[
            "control", "control", "control", "control", "control", "treatment", "treatment",
            "treatment", "treatment", "treatment",
        ],
        &[1.0, 0.0, 2.0, 1.0, 3.0, 2.0, 1.0, 3.0, 4.0, 2.0],
        &[3.0, 1.0, 4.0, 2.0, 5.0, 3.0, 2.0, 4.0, 5.0, 3.0],
    )?;

    let ctx = SessionContext::new();
    ctx.register_batch("users", batch)?;
    let source = DataFusionSource::table(ctx, "users")?;

    let request = AggregateRequest::new()
        .with_var("orders")
        .with_var("sessions")
        .with_cov("orders", "sessions");
    let by_variant = read_grouped_aggregates(source, "variant", &request).await?;

    for (variant, aggr) in &by_variant {
        let (value, std_err) = orders_per_session(aggr)?;
        println!(
            "{variant}: n = {}, orders/session = {value:.4} (se {std_err:.4})",
            aggr.count()?
        );
    }

    let control = &by_variant[&GroupKey::from("control")];
    let treatment = &by_variant[&GroupKey::from("treatment")];
    let (control_value, control_se) = orders_per_session(control)?;
    let (treatment_value, treatment_se) = orders_per_session(treatment)?;
    let z = (treatment_value - control_value) / control_se.hypot(treatment_se);
    println!("\nRelative effect: {:+.2}%", (treatment_value / control_value - 1.0) * 100.0);
    println!("z statistic: {z:.3}");

    // Pooled statistics of the whole experiment, without another query.
    let pooled = control.combine(treatment)?;
    println!(
        "\nAll users: n = {}, mean orders = {:.4}, var orders = {:.4}",
        pooled.count()?,
        pooled.mean("orders")?,
        pooled.var("orders")?
    );

    Ok(())
}
