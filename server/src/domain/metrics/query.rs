use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::constants::POSTGRES_METRIC_NAMES;
use crate::core::telemetry::{TelemetryLogger, error_chain};
use crate::data::azure::{AzureError, MetricsBackend, QueryWindow, RawMetricResult};
use crate::domain::inventory::InstanceIdentity;
use crate::utils::time::Clock;

const CLASS_NAME: &str = "MetricQuery";

/// The backend could not produce series for an instance
#[derive(Error, Debug)]
pub enum QueryFailure {
    #[error(transparent)]
    Backend(#[from] AzureError),

    #[error("Metric query timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Fixed-window query of the PostgreSQL metric set for one instance
pub struct MetricQuery {
    backend: Arc<dyn MetricsBackend>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl MetricQuery {
    pub fn new(backend: Arc<dyn MetricsBackend>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            backend,
            clock,
            timeout,
        }
    }

    pub async fn query(
        &self,
        identity: &InstanceIdentity,
        logger: &mut TelemetryLogger,
    ) -> Result<RawMetricResult, QueryFailure> {
        let window = QueryWindow::lookback(self.clock.now());
        let resource_id = identity.resource_id();
        logger.info(CLASS_NAME, "query", "Metric query options are prepared.");

        logger.info(CLASS_NAME, "query", "Performing metric query...");
        let result = tokio::time::timeout(
            self.timeout,
            self.backend
                .query_resource(&resource_id, &POSTGRES_METRIC_NAMES, &window),
        )
        .await
        .map_err(|_| QueryFailure::Timeout(self.timeout))
        .and_then(|r| r.map_err(QueryFailure::from));

        match &result {
            Ok(raw) => {
                tracing::debug!(instance = %identity, metrics = raw.metrics.len(), "Metric query returned");
                logger.info(CLASS_NAME, "query", "Metric query is performed.");
            }
            Err(e) => logger.error(
                CLASS_NAME,
                "query",
                "Metric query is failed.",
                e.to_string(),
                error_chain(e),
            ),
        }
        result
    }
}
