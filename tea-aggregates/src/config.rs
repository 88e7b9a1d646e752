//! Execution settings for the DataFusion backend.

use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use std::sync::Arc;
use tracing::instrument;

use crate::error::AggregateResult;

/// Configuration for the [`SessionContext`] that aggregation queries run on.
///
/// ```rust
/// use tea_aggregates::config::EngineConfig;
///
/// let ctx = EngineConfig::default()
///     .with_batch_size(16_384)
///     .with_max_memory(512 * 1024 * 1024)
///     .session_context()
///     .unwrap();
/// # drop(ctx);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Whether `information_schema` tables are available
    pub information_schema: bool,
    /// Memory limit in bytes; unbounded when `None`
    pub max_memory: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
            information_schema: false,
            max_memory: None,
        }
    }
}

impl EngineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_target_partitions(mut self, target_partitions: usize) -> Self {
        self.target_partitions = target_partitions;
        self
    }

    pub fn with_information_schema(mut self, enabled: bool) -> Self {
        self.information_schema = enabled;
        self
    }

    /// Caps query memory; operators spill once the pool is exhausted.
    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Builds a session context with these settings.
    #[instrument(skip(self), fields(batch_size = self.batch_size, target_partitions = self.target_partitions))]
    pub fn session_context(&self) -> AggregateResult<SessionContext> {
        let session_config = SessionConfig::new()
            .with_batch_size(self.batch_size)
            .with_target_partitions(self.target_partitions)
            .with_information_schema(self.information_schema);

        let Some(max_memory) = self.max_memory else {
            return Ok(SessionContext::new_with_config(session_config));
        };

        let memory_pool = Arc::new(FairSpillPool::new(max_memory)) as Arc<dyn MemoryPool>;
        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .with_temp_file_path(std::env::temp_dir())
            .build()
            .map(Arc::new)?;

        Ok(SessionContext::new_with_config_rt(session_config, runtime_env))
    }
}
