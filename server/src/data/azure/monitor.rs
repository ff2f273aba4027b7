//! Azure Monitor metrics REST client

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::credential::AzureCredential;
use super::error::AzureError;
use super::types::{MetricSample, QueryWindow, RawMetric, RawMetricResult, TimeSeries};
use crate::core::constants::{AZURE_MANAGEMENT_SCOPE, AZURE_MONITOR_API_VERSION};
use crate::utils::time::{iso8601_seconds, to_rfc3339_secs};

/// Source of per-resource metric time series
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Average-aggregated series for `metric_names` of one resource
    async fn query_resource(
        &self,
        resource_id: &str,
        metric_names: &[&str],
        window: &QueryWindow,
    ) -> Result<RawMetricResult, AzureError>;
}

pub struct AzureMonitorClient {
    http: reqwest::Client,
    endpoint: String,
    credential: Arc<AzureCredential>,
}

impl AzureMonitorClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        credential: Arc<AzureCredential>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            credential,
        }
    }

    fn metrics_url(
        &self,
        resource_id: &str,
        metric_names: &[&str],
        window: &QueryWindow,
    ) -> Result<reqwest::Url, AzureError> {
        let base = format!(
            "{}{}/providers/Microsoft.Insights/metrics",
            self.endpoint.trim_end_matches('/'),
            resource_id
        );
        let mut url = reqwest::Url::parse(&base).map_err(|e| AzureError::Url(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("api-version", AZURE_MONITOR_API_VERSION)
            .append_pair("metricnames", &metric_names.join(","))
            .append_pair(
                "timespan",
                &format!(
                    "{}/{}",
                    to_rfc3339_secs(&window.start),
                    to_rfc3339_secs(&window.end)
                ),
            )
            .append_pair("interval", &iso8601_seconds(window.granularity.num_seconds()))
            .append_pair("aggregation", "Average");
        Ok(url)
    }
}

#[async_trait]
impl MetricsBackend for AzureMonitorClient {
    async fn query_resource(
        &self,
        resource_id: &str,
        metric_names: &[&str],
        window: &QueryWindow,
    ) -> Result<RawMetricResult, AzureError> {
        let url = self.metrics_url(resource_id, metric_names, window)?;
        let token = self.credential.token(AZURE_MANAGEMENT_SCOPE).await?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AzureError::from_response("Monitor", resp).await);
        }

        let body: MetricsResponse = resp.json().await?;
        Ok(body.into())
    }
}

// Wire format of `GET .../providers/Microsoft.Insights/metrics`

#[derive(Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    value: Vec<MetricEntry>,
}

#[derive(Deserialize)]
struct MetricEntry {
    name: LocalizableString,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    timeseries: Vec<TimeSeriesEntry>,
}

#[derive(Deserialize)]
struct LocalizableString {
    value: String,
}

#[derive(Deserialize)]
struct TimeSeriesEntry {
    #[serde(default)]
    data: Vec<MetricValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricValue {
    time_stamp: DateTime<Utc>,
    #[serde(default)]
    average: Option<f64>,
}

impl From<MetricsResponse> for RawMetricResult {
    fn from(resp: MetricsResponse) -> Self {
        let metrics = resp
            .value
            .into_iter()
            .map(|entry| RawMetric {
                name: entry.name.value,
                unit: entry.unit,
                timeseries: entry
                    .timeseries
                    .into_iter()
                    .map(|ts| TimeSeries {
                        data: ts
                            .data
                            .into_iter()
                            .map(|v| MetricSample {
                                timestamp: v.time_stamp,
                                average: v.average,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self { metrics }
    }
}
