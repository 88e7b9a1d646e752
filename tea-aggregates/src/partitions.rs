//! Persistence of per-partition aggregates.
//!
//! Aggregates computed over independent partitions (days, shards, regions) can
//! be stored and later merged into the statistics of their union without
//! re-reading the raw data.
//!
//! ```rust
//! use tea_aggregates::aggregates::Aggregates;
//! use tea_aggregates::partitions::{combine_partitions, InMemoryPartitionStore, PartitionStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tea_aggregates::error::AggregateResult<()> {
//! let store = InMemoryPartitionStore::new();
//! let day = |n, mean| Aggregates::builder().count(n).mean("x", mean).build();
//! store.save("2024-01-01", &day(2, 1.0)?).await?;
//! store.save("2024-01-02", &day(6, 3.0)?).await?;
//!
//! let partitions = store.list_partitions().await?;
//! let total = combine_partitions(&store, &partitions).await?;
//! assert_eq!(total.count()?, 8);
//! assert_eq!(total.mean("x")?, 2.5);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::aggregates::Aggregates;
use crate::error::{AggregateError, AggregateResult};
use crate::security::validate_partition_name;

/// Storage for aggregates keyed by partition name.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Stores the aggregates of a partition, replacing any previous value.
    async fn save(&self, partition: &str, aggregates: &Aggregates) -> AggregateResult<()>;

    /// Loads the aggregates of a partition, if stored.
    async fn load(&self, partition: &str) -> AggregateResult<Option<Aggregates>>;

    /// Lists stored partitions ordered by name.
    async fn list_partitions(&self) -> AggregateResult<Vec<String>>;

    /// Deletes a partition. Deleting a missing partition is not an error.
    async fn delete(&self, partition: &str) -> AggregateResult<()>;

    /// Loads several partitions, failing on the first missing one.
    async fn load_batch(&self, partitions: &[String]) -> AggregateResult<Vec<Aggregates>> {
        let mut results = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let aggregates = self
                .load(partition)
                .await?
                .ok_or_else(|| AggregateError::PartitionNotFound(partition.clone()))?;
            results.push(aggregates);
        }
        Ok(results)
    }
}

/// Loads the given partitions and merges them into the aggregates of their union.
///
/// Fails with [`AggregateError::PartitionNotFound`] for a missing partition and
/// with [`AggregateError::IncompatibleAggregates`] when `partitions` is empty.
#[instrument(skip(store))]
pub async fn combine_partitions<S: PartitionStore + ?Sized>(
    store: &S,
    partitions: &[String],
) -> AggregateResult<Aggregates> {
    let loaded = store.load_batch(partitions).await?;
    let combined = Aggregates::merge(loaded)?;
    debug!(partitions = partitions.len(), "Combined partitions");
    Ok(combined)
}

/// File system implementation of [`PartitionStore`].
///
/// Each partition is one JSON document:
/// ```text
/// base_path/
/// ├── 2024-01-14.json
/// └── 2024-01-15.json
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemPartitionStore {
    base_path: PathBuf,
}

impl FileSystemPartitionStore {
    /// Creates the store, creating `base_path` if needed.
    pub fn new<P: AsRef<Path>>(base_path: P) -> AggregateResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn partition_path(&self, partition: &str) -> AggregateResult<PathBuf> {
        validate_partition_name(partition)?;
        Ok(self.base_path.join(format!("{partition}.json")))
    }
}

#[async_trait]
impl PartitionStore for FileSystemPartitionStore {
    #[instrument(skip(self, aggregates))]
    async fn save(&self, partition: &str, aggregates: &Aggregates) -> AggregateResult<()> {
        let path = self.partition_path(partition)?;
        let data = serde_json::to_vec_pretty(aggregates)?;
        fs::write(&path, data).await?;
        debug!(partition = %partition, "Saved partition aggregates");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(&self, partition: &str) -> AggregateResult<Option<Aggregates>> {
        let path = self.partition_path(partition)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(partition = %partition, "No stored aggregates");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    #[instrument(skip(self))]
    async fn list_partitions(&self) -> AggregateResult<Vec<String>> {
        let mut partitions = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                partitions.push(name.to_string());
            }
        }

        partitions.sort();
        debug!(count = partitions.len(), "Listed partitions");
        Ok(partitions)
    }

    #[instrument(skip(self))]
    async fn delete(&self, partition: &str) -> AggregateResult<()> {
        let path = self.partition_path(partition)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(partition = %partition, "Deleted partition");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory implementation of [`PartitionStore`].
#[derive(Debug, Default)]
pub struct InMemoryPartitionStore {
    partitions: RwLock<BTreeMap<String, Aggregates>>,
}

impl InMemoryPartitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PartitionStore for InMemoryPartitionStore {
    async fn save(&self, partition: &str, aggregates: &Aggregates) -> AggregateResult<()> {
        validate_partition_name(partition)?;
        self.partitions
            .write()
            .await
            .insert(partition.to_string(), aggregates.clone());
        Ok(())
    }

    async fn load(&self, partition: &str) -> AggregateResult<Option<Aggregates>> {
        Ok(self.partitions.read().await.get(partition).cloned())
    }

    async fn list_partitions(&self) -> AggregateResult<Vec<String>> {
        Ok(self.partitions.read().await.keys().cloned().collect())
    }

    async fn delete(&self, partition: &str) -> AggregateResult<()> {
        self.partitions.write().await.remove(partition);
        Ok(())
    }
}
