//! Example storing daily aggregates and merging them into a running total.
//!
//! Each day is read once and persisted as JSON. Totals over any set of days
//! come from merging the stored aggregates; the raw rows are never re-read.

use tea_aggregates::logging::setup::{init_logging, LoggingConfig};
use tea_aggregates::partitions::FileSystemPartitionStore;
use tea_aggregates::prelude::*;
use tea_aggregates_demos::experiment_batch;
use tempfile::TempDir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default().with_json_format(true))?;

    println!("=== Partitioned Aggregates Example ===\n");

    let state_dir = TempDir::new()?;
    let store = FileSystemPartitionStore::new(state_dir.path())?;
    println!("Partition directory: {:?}\n", store.base_path());

    let days: [(&str, [f64; 3], [f64; 3]); 3] = [
        ("2024-01-01", [1.0, 0.0, 2.0], [2.0, 1.0, 3.0]),
        ("2024-01-02", [3.0, 1.0, 1.0], [4.0, 2.0, 1.0]),
        ("2024-01-03", [0.0, 2.0, 5.0], [1.0, 3.0, 6.0]),
    ];
    let request = AggregateRequest::new()
        .with_var("orders")
        .with_var("sessions")
        .with_cov("orders", "sessions");

    for (day, orders, sessions) in days {
        let batch = experiment_batch(&["control"; 3], &orders, &sessions)?;
        let aggr = read_aggregates(DataFusionSource::from_batch(batch)?, &request).await?;
        store.save(day, &aggr).await?;
        println!("{day}: n = {}, mean orders = {:.3}", aggr.count()?, aggr.mean("orders")?);
    }

    let partitions = store.list_partitions().await?;
    let total = combine_partitions(&store, &partitions).await?;
    println!(
        "\nAll {} days: n = {}, mean orders = {:.3}, var orders = {:.3}, orders/session var = {:.5}",
        partitions.len(),
        total.count()?,
        total.mean("orders")?,
        total.var("orders")?,
        total.ratio_var("orders", "sessions")?
    );

    let recent = combine_partitions(&store, &partitions[1..]).await?;
    println!("Last 2 days: n = {}, mean orders = {:.3}", recent.count()?, recent.mean("orders")?);

    Ok(())
}
