//! Fakes shared by the pipeline tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use httpmock::MockServer;

use crate::core::secret::Secret;
use crate::data::azure::{
    AzureError, MetricSample, MetricsBackend, QueryWindow, RawMetric, RawMetricResult, TimeSeries,
};
use crate::data::newrelic::{NewRelicClient, NewRelicSettings};
use crate::domain::inventory::InstanceIdentity;
use crate::utils::time::{Clock, FixedClock};

pub enum FakeResponse {
    Result(RawMetricResult),
    Status(u16, &'static str),
    Hang,
    Panic,
}

/// Arguments of one backend call
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub resource_id: String,
    pub metric_names: Vec<String>,
    pub window: QueryWindow,
}

/// Backend keyed by database name; unknown databases get an empty result
#[derive(Default)]
pub struct FakeBackend {
    responses: HashMap<String, FakeResponse>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
    requests: Mutex<Vec<RecordedQuery>>,
}

impl FakeBackend {
    pub fn with(mut self, database: &str, response: FakeResponse) -> Self {
        self.responses.insert(database.to_string(), response);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<RecordedQuery> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsBackend for FakeBackend {
    async fn query_resource(
        &self,
        resource_id: &str,
        metric_names: &[&str],
        window: &QueryWindow,
    ) -> Result<RawMetricResult, AzureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(RecordedQuery {
            resource_id: resource_id.to_string(),
            metric_names: metric_names.iter().map(|n| n.to_string()).collect(),
            window: *window,
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let database = resource_id.rsplit('/').next().unwrap_or_default();
        match self.responses.get(database) {
            Some(FakeResponse::Result(raw)) => Ok(raw.clone()),
            Some(FakeResponse::Status(code, body)) => Err(AzureError::Status {
                service: "Monitor",
                status: reqwest::StatusCode::from_u16(*code).unwrap(),
                body: body.to_string(),
            }),
            Some(FakeResponse::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(FakeResponse::Panic) => panic!("backend blew up for {database}"),
            None => Ok(RawMetricResult::default()),
        }
    }
}

pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap()))
}

pub fn newrelic_for(server: &MockServer) -> NewRelicClient {
    NewRelicClient::new(
        reqwest::Client::new(),
        NewRelicSettings {
            metrics_url: server.url("/metric/v1"),
            logs_url: server.url("/log/v1"),
            api_key: Secret::new("license"),
        },
    )
}

/// One `cpu_percent` series with the given averages, 10 s apart from midnight
pub fn cpu_series(averages: &[Option<f64>]) -> RawMetricResult {
    let data = averages
        .iter()
        .enumerate()
        .map(|(i, average)| MetricSample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::seconds(10 * i as i64),
            average: *average,
        })
        .collect();

    RawMetricResult {
        metrics: vec![RawMetric {
            name: "cpu_percent".to_string(),
            unit: "Percent".to_string(),
            timeseries: vec![TimeSeries { data }],
        }],
    }
}

pub fn identity(database: &str) -> InstanceIdentity {
    InstanceIdentity::new("sub-1", "rg-1", database)
}
