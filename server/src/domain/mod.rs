//! Domain logic for metric forwarding
//!
//! - `inventory` - monitored instance config and its reader
//! - `metrics` - query, shape and delivery pipeline

pub mod inventory;
pub mod metrics;

pub use inventory::{ConfigReader, InstanceIdentity, MonitoringConfig};
pub use metrics::{ForwardPipeline, PipelineConfig};
