use std::time::Duration;

use thiserror::Error;

use super::shape::ShapedBatch;
use crate::core::telemetry::TelemetryLogger;
use crate::data::newrelic::NewRelicClient;

const CLASS_NAME: &str = "MetricDelivery";

/// How the Metric API answered a single POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Non-2xx response, body verbatim
    Rejected(String),
    /// Transport failure or timeout
    Error(String),
}

#[derive(Error, Debug)]
enum DeliveryError {
    #[error("Metric API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metric API request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Posts one instance's batch to the Metric API, once
pub struct MetricDelivery {
    client: NewRelicClient,
    timeout: Duration,
}

impl MetricDelivery {
    pub fn new(client: NewRelicClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn deliver(&self, batch: &ShapedBatch, logger: &mut TelemetryLogger) -> DeliveryOutcome {
        logger.info(CLASS_NAME, "deliver", "Flushing metrics to New Relic.");

        let outcome = match self.post(batch).await {
            Ok(resp) if resp.status().is_success() => DeliveryOutcome::Delivered,
            Ok(resp) => {
                let status = resp.status();
                let body = tokio::time::timeout(self.timeout, resp.text())
                    .await
                    .map_err(|_| format!("timed out after {}s", self.timeout.as_secs()))
                    .and_then(|r| r.map_err(|e| e.to_string()));
                tracing::debug!(%status, "Metric API rejected batch");
                DeliveryOutcome::Rejected(rejection_reason(status, body))
            }
            Err(e) => {
                logger.unexpected(CLASS_NAME, "deliver", &e);
                return DeliveryOutcome::Error(e.to_string());
            }
        };

        match &outcome {
            DeliveryOutcome::Rejected(body) => logger.error(
                CLASS_NAME,
                "deliver",
                "Metrics could not be flushed to New Relic.",
                body.clone(),
                None,
            ),
            _ => logger.info(CLASS_NAME, "deliver", "Metrics are flushed to New Relic."),
        }
        outcome
    }

    async fn post(&self, batch: &ShapedBatch) -> Result<reqwest::Response, DeliveryError> {
        tokio::time::timeout(
            self.timeout,
            self.client.send_metrics(&batch.attributes, &batch.points),
        )
        .await
        .map_err(|_| DeliveryError::Timeout(self.timeout))?
        .map_err(DeliveryError::from)
    }
}

/// Rejection body verbatim, or the status when the body cannot be read
fn rejection_reason(status: reqwest::StatusCode, body: Result<String, String>) -> String {
    match body {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(%status, error = %e, "Failed to read Metric API rejection body");
            format!("HTTP {} (response body unreadable: {})", status, e)
        }
    }
}
