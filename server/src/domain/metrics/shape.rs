//! Azure Monitor series to New Relic Metric API points

use serde::Serialize;

use crate::core::constants::{METRIC_NAME_PREFIX, METRIC_TYPE_GAUGE};
use crate::data::azure::RawMetricResult;
use crate::data::newrelic::Attributes;
use crate::domain::inventory::InstanceIdentity;
use crate::utils::time::to_unix_millis;

/// One Metric API data point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapedMetricPoint {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: &'static str,
    pub value: f64,
    /// Milliseconds since Unix epoch
    pub timestamp: i64,
}

/// Points of one instance plus the attributes they share
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedBatch {
    pub attributes: Attributes,
    pub points: Vec<ShapedMetricPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeOutcome {
    Batch(ShapedBatch),
    /// The backend returned no metric entries at all
    NoData,
}

/// Flatten every usable sample into a gauge point, in backend order.
///
/// Samples without an average are skipped. A result with entries but no
/// usable samples still yields a `Batch`, with no points.
pub fn shape(raw: &RawMetricResult, identity: &InstanceIdentity) -> ShapeOutcome {
    let Some(first) = raw.metrics.first() else {
        return ShapeOutcome::NoData;
    };

    let mut attributes = Attributes::new();
    attributes.insert(
        "subscriptionId".to_string(),
        identity.subscription_id().to_string(),
    );
    attributes.insert(
        "resourceGroupName".to_string(),
        identity.resource_group_name().to_string(),
    );
    attributes.insert(
        "databaseName".to_string(),
        identity.database_name().to_string(),
    );
    attributes.insert("metricUnit".to_string(), first.unit.clone());

    let points = raw
        .metrics
        .iter()
        .flat_map(|metric| {
            let name = format!("{}{}", METRIC_NAME_PREFIX, metric.name);
            metric
                .timeseries
                .iter()
                .flat_map(|series| series.data.iter())
                .filter_map(move |sample| {
                    sample.average.map(|value| ShapedMetricPoint {
                        name: name.clone(),
                        metric_type: METRIC_TYPE_GAUGE,
                        value,
                        timestamp: to_unix_millis(&sample.timestamp),
                    })
                })
        })
        .collect();

    ShapeOutcome::Batch(ShapedBatch { attributes, points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::azure::{MetricSample, RawMetric, TimeSeries};
    use chrono::{TimeZone, Utc};

    fn sample(secs: u32, average: Option<f64>) -> MetricSample {
        MetricSample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, secs).unwrap(),
            average,
        }
    }

    fn metric(name: &str, unit: &str, data: Vec<MetricSample>) -> RawMetric {
        RawMetric {
            name: name.to_string(),
            unit: unit.to_string(),
            timeseries: vec![TimeSeries { data }],
        }
    }

    fn identity() -> InstanceIdentity {
        InstanceIdentity::new("sub", "rg", "pg-1")
    }

    fn batch(outcome: ShapeOutcome) -> ShapedBatch {
        match outcome {
            ShapeOutcome::Batch(batch) => batch,
            ShapeOutcome::NoData => panic!("expected a batch"),
        }
    }

    #[test]
    fn test_empty_result_is_no_data() {
        let outcome = shape(&RawMetricResult::default(), &identity());
        assert_eq!(outcome, ShapeOutcome::NoData);
    }

    #[test]
    fn test_points_named_and_typed() {
        let raw = RawMetricResult {
            metrics: vec![
                metric("cpu_percent", "Percent", vec![sample(0, Some(1.0)), sample(10, Some(2.0))]),
                metric("read_iops", "Count", vec![sample(0, Some(3.0))]),
            ],
        };

        let batch = batch(shape(&raw, &identity()));
        let names: Vec<_> = batch.points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "azure.postgresserver.flexible.cpu_percent",
                "azure.postgresserver.flexible.cpu_percent",
                "azure.postgresserver.flexible.read_iops",
            ]
        );
        assert!(batch.points.iter().all(|p| p.metric_type == "gauge"));
        assert_eq!(batch.points[2].value, 3.0);
    }

    #[test]
    fn test_unusable_samples_dropped() {
        let raw = RawMetricResult {
            metrics: vec![metric(
                "cpu_percent",
                "Percent",
                vec![sample(0, None), sample(10, Some(4.5)), sample(20, None)],
            )],
        };

        let batch = batch(shape(&raw, &identity()));
        assert_eq!(batch.points.len(), 1);
        assert_eq!(batch.points[0].value, 4.5);
    }

    #[test]
    fn test_all_unusable_yields_empty_batch() {
        let raw = RawMetricResult {
            metrics: vec![metric("cpu_percent", "Percent", vec![sample(0, None)])],
        };

        let batch = batch(shape(&raw, &identity()));
        assert!(batch.points.is_empty());
        assert_eq!(batch.attributes["metricUnit"], "Percent");
    }

    #[test]
    fn test_attributes_and_unit_from_first_metric() {
        let raw = RawMetricResult {
            metrics: vec![
                metric("read_throughput", "BytesPerSecond", vec![sample(0, Some(1.0))]),
                metric("cpu_percent", "Percent", vec![sample(0, Some(1.0))]),
            ],
        };

        let batch = batch(shape(&raw, &identity()));
        assert_eq!(batch.attributes["subscriptionId"], "sub");
        assert_eq!(batch.attributes["resourceGroupName"], "rg");
        assert_eq!(batch.attributes["databaseName"], "pg-1");
        assert_eq!(batch.attributes["metricUnit"], "BytesPerSecond");
    }

    #[test]
    fn test_timestamp_in_unix_millis() {
        let raw = RawMetricResult {
            metrics: vec![metric("cpu_percent", "Percent", vec![sample(0, Some(1.0))])],
        };

        let batch = batch(shape(&raw, &identity()));
        assert_eq!(batch.points[0].timestamp, 1_704_067_200_000);
    }

    #[test]
    fn test_point_serializes_type_key() {
        let point = ShapedMetricPoint {
            name: "azure.postgresserver.flexible.cpu_percent".to_string(),
            metric_type: "gauge",
            value: 1.5,
            timestamp: 1_704_067_200_000,
        };

        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "azure.postgresserver.flexible.cpu_percent",
                "type": "gauge",
                "value": 1.5,
                "timestamp": 1_704_067_200_000_i64
            })
        );
    }
}
