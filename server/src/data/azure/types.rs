//! Metric query inputs and results, independent of the REST wire format

use chrono::{DateTime, Duration, Utc};

use crate::core::constants::{QUERY_GRANULARITY_SECS, QUERY_WINDOW_MINUTES};

/// Time range and aggregation interval of one metric query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Duration,
}

impl QueryWindow {
    /// The fixed five-minute lookback ending at `now`, 10-second buckets
    pub fn lookback(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::minutes(QUERY_WINDOW_MINUTES),
            end: now,
            granularity: Duration::seconds(QUERY_GRANULARITY_SECS),
        }
    }
}

/// All series returned for one resource, one entry per requested metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetricResult {
    pub metrics: Vec<RawMetric>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMetric {
    pub name: String,
    pub unit: String,
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub data: Vec<MetricSample>,
}

/// One aggregation bucket; `average` is absent when the bucket had no data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub average: Option<f64>,
}
