//! Metric forwarding pipeline
//!
//! One run reads the inventory, then for every instance concurrently:
//! query Azure Monitor, reshape the series into Metric API points and POST
//! them to New Relic. Instances fail independently; nothing is retried.

mod deliver;
mod pipeline;
mod processor;
mod query;
mod shape;

#[cfg(test)]
mod test_support;

pub use deliver::{DeliveryOutcome, MetricDelivery};
pub use pipeline::ForwardPipeline;
pub use processor::{CycleOutcome, MetricProcessor};
pub use query::{MetricQuery, QueryFailure};
pub use shape::{ShapeOutcome, ShapedBatch, ShapedMetricPoint, shape};

use std::time::Duration;

use crate::core::constants::{
    DEFAULT_DELIVERY_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENCY, DEFAULT_QUERY_TIMEOUT_SECS,
};

/// Tunables of one pipeline instance, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Instances processed at the same time
    pub max_concurrency: usize,
    pub query_timeout: Duration,
    pub delivery_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            delivery_timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECS),
        }
    }
}
