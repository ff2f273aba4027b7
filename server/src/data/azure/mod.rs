//! Azure collaborators: identity (token, client secret, managed identity), Monitor metrics

mod credential;
mod error;
mod monitor;
mod types;

pub use credential::{
    AzureCredential, ClientSecretCredential, ManagedIdentityCredential, ManagedIdentitySource,
};
pub use error::AzureError;
pub use monitor::{AzureMonitorClient, MetricsBackend};
pub use types::{MetricSample, QueryWindow, RawMetric, RawMetricResult, TimeSeries};
