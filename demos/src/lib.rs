//! Shared sample data for the demo programs.

use datafusion::arrow::array::{Float64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::error::ArrowError;
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// One row per user: variant, orders placed and sessions started.
pub fn experiment_batch(
    variants: &[&str],
    orders: &[f64],
    sessions: &[f64],
) -> Result<RecordBatch, ArrowError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("variant", DataType::Utf8, false),
        Field::new("orders", DataType::Float64, false),
        Field::new("sessions", DataType::Float64, false),
    ]));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(variants.to_vec())),
            Arc::new(Float64Array::from(orders.to_vec())),
            Arc::new(Float64Array::from(sessions.to_vec())),
        ],
    )
}
