//! Integration tests for persisting and merging per-partition aggregates.

use tea_aggregates::aggregates::{AggregateRequest, Aggregates};
use tea_aggregates::backend::MemoryTable;
use tea_aggregates::error::AggregateError;
use tea_aggregates::partitions::{combine_partitions, FileSystemPartitionStore, PartitionStore};
use tea_aggregates::reader::read_aggregates;
use tempfile::TempDir;

const DAYS: [(&str, [f64; 4]); 3] = [
    ("2024-01-01", [1.0, 2.0, 3.0, 4.0]),
    ("2024-01-02", [2.0, 2.0, 8.0, 0.0]),
    ("2024-01-03", [5.0, 1.0, 1.0, 1.0]),
];

fn request() -> AggregateRequest {
    AggregateRequest::new()
        .with_var("revenue")
        .with_cov("revenue", "sessions")
}

fn day_table(revenue: &[f64]) -> MemoryTable {
    MemoryTable::new()
        .with_column("revenue", revenue.iter().copied())
        .unwrap()
        .with_column("sessions", revenue.iter().map(|r| r * 0.5 + 1.0))
        .unwrap()
}

async fn populate(store: &FileSystemPartitionStore) {
    for (day, revenue) in DAYS {
        let aggr = read_aggregates(day_table(&revenue), &request()).await.unwrap();
        store.save(day, &aggr).await.unwrap();
    }
}

#[tokio::test]
async fn test_save_load_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemPartitionStore::new(temp_dir.path()).unwrap();
    populate(&store).await;

    let loaded = store.load("2024-01-01").await.unwrap().unwrap();
    let expected = read_aggregates(day_table(&DAYS[0].1), &request()).await.unwrap();
    assert_eq!(loaded, expected);

    let json = std::fs::read_to_string(temp_dir.path().join("2024-01-01.json")).unwrap();
    assert!(json.contains("\"cov\""));
    assert!(json.contains("\"left\": \"revenue\""));

    assert!(store.load("2023-12-31").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_and_delete() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemPartitionStore::new(temp_dir.path()).unwrap();
    populate(&store).await;
    std::fs::write(temp_dir.path().join("notes.txt"), "not a partition").unwrap();

    assert_eq!(
        store.list_partitions().await.unwrap(),
        vec!["2024-01-01", "2024-01-02", "2024-01-03"]
    );

    store.delete("2024-01-02").await.unwrap();
    store.delete("2024-01-02").await.unwrap();
    assert_eq!(
        store.list_partitions().await.unwrap(),
        vec!["2024-01-01", "2024-01-03"]
    );
}

#[tokio::test]
async fn test_store_survives_reopening() {
    let temp_dir = TempDir::new().unwrap();
    populate(&FileSystemPartitionStore::new(temp_dir.path()).unwrap()).await;

    let reopened = FileSystemPartitionStore::new(temp_dir.path()).unwrap();
    assert_eq!(reopened.list_partitions().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_combined_partitions_match_full_read() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemPartitionStore::new(temp_dir.path()).unwrap();
    populate(&store).await;

    let partitions = store.list_partitions().await.unwrap();
    let combined = combine_partitions(&store, &partitions).await.unwrap();

    let all: Vec<f64> = DAYS.iter().flat_map(|(_, revenue)| *revenue).collect();
    let direct = read_aggregates(day_table(&all), &request()).await.unwrap();

    assert_eq!(combined.count().unwrap(), 12);
    assert!((combined.mean("revenue").unwrap() - direct.mean("revenue").unwrap()).abs() < 1e-9);
    assert!((combined.var("revenue").unwrap() - direct.var("revenue").unwrap()).abs() < 1e-9);
    assert!(
        (combined.cov("sessions", "revenue").unwrap() - direct.cov("revenue", "sessions").unwrap())
            .abs()
            < 1e-9
    );
}

#[tokio::test]
async fn test_partition_names_are_validated() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemPartitionStore::new(temp_dir.path().join("nested")).unwrap();
    let aggr = Aggregates::builder().count(1).build().unwrap();

    for name in ["../outside", "a/b", "", ".hidden"] {
        let err = store.save(name, &aggr).await.unwrap_err();
        assert!(matches!(err, AggregateError::Security(_)), "{name}");
    }
    assert!(store.list_partitions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_partition_is_a_serialization_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemPartitionStore::new(temp_dir.path()).unwrap();
    std::fs::write(
        temp_dir.path().join("broken.json"),
        r#"{"count": null, "mean": {"x": 1.0}, "var": {"x": 1.0}}"#,
    )
    .unwrap();

    let err = store.load("broken").await.unwrap_err();
    assert!(matches!(err, AggregateError::Serialization(_)));

    let err = combine_partitions(&store, &["broken".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, AggregateError::Serialization(_)));
}

#[tokio::test]
async fn test_single_row_partition_roundtrip_and_merge() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemPartitionStore::new(temp_dir.path()).unwrap();

    let single = read_aggregates(day_table(&[3.0]), &request()).await.unwrap();
    assert!(single.var("revenue").unwrap().is_nan());
    store.save("d1", &single).await.unwrap();
    let pair = read_aggregates(day_table(&[1.0, 3.0]), &request()).await.unwrap();
    store.save("d2", &pair).await.unwrap();

    let loaded = store.load("d1").await.unwrap().unwrap();
    assert_eq!(loaded.count().unwrap(), 1);
    assert_eq!(loaded.mean("revenue").unwrap(), 3.0);
    assert!(loaded.var("revenue").unwrap().is_nan());
    assert!(loaded.cov("revenue", "sessions").unwrap().is_nan());

    let combined = combine_partitions(&store, &["d1".to_string(), "d2".to_string()])
        .await
        .unwrap();
    let direct = read_aggregates(day_table(&[3.0, 1.0, 3.0]), &request())
        .await
        .unwrap();

    assert_eq!(combined.count().unwrap(), 3);
    assert!((combined.var("revenue").unwrap() - 4.0 / 3.0).abs() < 1e-9);
    assert!((combined.var("revenue").unwrap() - direct.var("revenue").unwrap()).abs() < 1e-9);
    assert!(
        (combined.cov("revenue", "sessions").unwrap() - direct.cov("revenue", "sessions").unwrap())
            .abs()
            < 1e-9
    );
}
