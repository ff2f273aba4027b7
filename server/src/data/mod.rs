//! External collaborators
//!
//! - `azure` - identity tokens and Azure Monitor metrics
//! - `config_source` - where `config.json` is fetched from
//! - `newrelic` - Metric and Log API ingestion

pub mod azure;
pub mod config_source;
pub mod newrelic;

pub use azure::{AzureCredential, AzureMonitorClient, MetricsBackend};
pub use config_source::{ConfigSource, ConfigSourceError};
pub use newrelic::{NewRelicClient, NewRelicSettings};
