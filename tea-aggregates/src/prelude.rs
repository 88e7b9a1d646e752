//! Prelude for commonly used types and traits in tea-aggregates.

pub use crate::aggregates::{AggregateRequest, Aggregates, Operand, VarPair};
pub use crate::backend::{DataFusionSource, GroupKey, MemoryTable, TabularSource};
pub use crate::config::EngineConfig;
pub use crate::error::{AggregateError, AggregateResult};
pub use crate::partitions::{combine_partitions, PartitionStore};
pub use crate::reader::{read_aggregates, read_grouped_aggregates, GroupedAggregates};
