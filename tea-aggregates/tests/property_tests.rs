//! Property-based tests for the aggregate algebra.
//!
//! Samples are read through the in-memory backend so every property is checked
//! against statistics computed by the same two-pass reader used in production.

use proptest::prelude::*;
use tea_aggregates::aggregates::{AggregateRequest, Aggregates, Operand};
use tea_aggregates::backend::MemoryTable;
use tea_aggregates::reader::read_aggregates;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn table(rows: &[(f64, f64)]) -> MemoryTable {
    MemoryTable::new()
        .with_column("x", rows.iter().map(|r| r.0))
        .unwrap()
        .with_column("y", rows.iter().map(|r| r.1))
        .unwrap()
}

fn request() -> AggregateRequest {
    AggregateRequest::new()
        .with_var("x")
        .with_var("y")
        .with_cov("x", "y")
}

fn read(rows: &[(f64, f64)]) -> Aggregates {
    block_on(read_aggregates(table(rows), &request())).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}

fn rows_strategy(min: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-100.0..100.0f64, -100.0..100.0f64), min..30)
}

fn aggregates_strategy() -> impl Strategy<Value = Aggregates> {
    (
        2u64..1000,
        -10.0..10.0f64,
        -10.0..10.0f64,
        0.0..5.0f64,
        0.0..5.0f64,
        -1.0..1.0f64,
    )
        .prop_map(|(n, mx, my, vx, vy, c)| {
            Aggregates::builder()
                .count(n)
                .mean("x", mx)
                .mean("y", my)
                .var("x", vx)
                .var("y", vy)
                .cov("x", "y", c)
                .build()
                .unwrap()
        })
}

proptest! {
    #[test]
    fn prop_combine_matches_concatenation(a in rows_strategy(1), b in rows_strategy(1)) {
        let combined = read(&a).combine(&read(&b)).unwrap();
        let concatenated: Vec<_> = a.iter().chain(&b).copied().collect();
        let direct = read(&concatenated);

        prop_assert_eq!(combined.count().unwrap(), direct.count().unwrap());
        for name in ["x", "y"] {
            prop_assert!(close(combined.mean(name).unwrap(), direct.mean(name).unwrap()));
            prop_assert!(close(combined.var(name).unwrap(), direct.var(name).unwrap()));
        }
        prop_assert!(close(combined.cov("x", "y").unwrap(), direct.cov("x", "y").unwrap()));
    }

    #[test]
    fn prop_merge_is_order_independent(rows in rows_strategy(8), splits in 2usize..5) {
        let chunk = rows.len().div_ceil(splits);
        let parts: Vec<Aggregates> = rows.chunks(chunk).map(read).collect();

        let tree = Aggregates::merge(parts.clone()).unwrap();
        let mut reversed = parts;
        reversed.reverse();
        let folded = reversed[1..]
            .iter()
            .try_fold(reversed[0].clone(), |acc, part| acc.combine(part))
            .unwrap();

        prop_assert_eq!(tree.count().unwrap(), rows.len() as u64);
        prop_assert!(close(tree.mean("x").unwrap(), folded.mean("x").unwrap()));
        prop_assert!(close(tree.var("y").unwrap(), folded.var("y").unwrap()));
        prop_assert!(close(tree.cov("x", "y").unwrap(), folded.cov("y", "x").unwrap()));
    }

    #[test]
    fn prop_covariance_is_symmetric(aggr in aggregates_strategy()) {
        prop_assert_eq!(aggr.cov("x", "y").unwrap(), aggr.cov("y", "x").unwrap());
        prop_assert_eq!(
            aggr.ratio_cov("x", Operand::One, "y", Operand::One).unwrap(),
            aggr.ratio_cov("y", Operand::One, "x", Operand::One).unwrap()
        );
    }

    #[test]
    fn prop_filter_is_idempotent(aggr in aggregates_strategy(), with_cov in any::<bool>()) {
        let request = if with_cov {
            AggregateRequest::new().with_cov("y", "x")
        } else {
            AggregateRequest::new().with_var("y")
        };
        let once = aggr.filter(&request).unwrap();
        prop_assert_eq!(once.filter(&request).unwrap(), once.clone());
        prop_assert_eq!(AggregateRequest::of(&once), request);
    }

    #[test]
    fn prop_constant_operand(aggr in aggregates_strategy()) {
        prop_assert_eq!(aggr.mean(Operand::One).unwrap(), 1.0);
        prop_assert_eq!(aggr.var(Operand::One).unwrap(), 0.0);
        prop_assert_eq!(aggr.cov("x", Operand::One).unwrap(), 0.0);
        prop_assert_eq!(aggr.cov(Operand::One, "y").unwrap(), 0.0);
        prop_assert_eq!(aggr.ratio_var("x", Operand::One).unwrap(), aggr.var("x").unwrap());
        prop_assert_eq!(aggr.ratio_var("y", None::<&str>).unwrap(), aggr.var("y").unwrap());
    }

    #[test]
    fn prop_serde_roundtrip(aggr in aggregates_strategy()) {
        let json = serde_json::to_string(&aggr).unwrap();
        let restored: Aggregates = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(restored, aggr);
    }
}

mod edge_case_tests {
    use super::*;

    #[test]
    fn test_single_observation_sides() {
        let combined = read(&[(1.0, 2.0)]).combine(&read(&[(3.0, 6.0)])).unwrap();
        let direct = read(&[(1.0, 2.0), (3.0, 6.0)]);

        assert_eq!(combined.count().unwrap(), 2);
        assert!(close(combined.var("x").unwrap(), direct.var("x").unwrap()));
        assert!(close(combined.cov("x", "y").unwrap(), 4.0));
    }

    #[test]
    fn test_worked_example() {
        let a: Vec<_> = [1.0, 2.0, 3.0].iter().map(|&x| (x, x)).collect();
        let b: Vec<_> = [4.0, 5.0, 6.0, 7.0].iter().map(|&x| (x, x)).collect();
        let combined = read(&a).combine(&read(&b)).unwrap();

        assert_eq!(combined.count().unwrap(), 7);
        assert!(close(combined.mean("x").unwrap(), 4.0));
        assert!(close(combined.var("x").unwrap(), 28.0 / 6.0));
    }
}
