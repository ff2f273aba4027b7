use super::deliver::{DeliveryOutcome, MetricDelivery};
use super::query::MetricQuery;
use super::shape::{ShapeOutcome, shape};
use crate::core::telemetry::TelemetryLogger;
use crate::domain::inventory::InstanceIdentity;

const CLASS_NAME: &str = "MetricProcessor";

/// Where a per-instance cycle stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    QueryFailed,
    NoData,
    /// Series came back but none of the samples carried a value
    NothingUsable,
    Delivery(DeliveryOutcome),
}

/// Query, shape and deliver for exactly one instance.
///
/// Owns its delivery unit and its sink; the sink is flushed once when the
/// cycle ends, whatever the outcome.
pub struct MetricProcessor {
    identity: InstanceIdentity,
    query: MetricQuery,
    delivery: MetricDelivery,
    logger: TelemetryLogger,
}

impl MetricProcessor {
    pub fn new(
        identity: InstanceIdentity,
        query: MetricQuery,
        delivery: MetricDelivery,
        logger: TelemetryLogger,
    ) -> Self {
        Self {
            logger: logger.with_instance(identity.clone()),
            identity,
            query,
            delivery,
        }
    }

    pub async fn run(mut self) -> CycleOutcome {
        let outcome = self.cycle().await;
        tracing::debug!(instance = %self.identity, ?outcome, "Instance cycle finished");
        self.logger.flush().await;
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let Ok(raw) = self.query.query(&self.identity, &mut self.logger).await else {
            return CycleOutcome::QueryFailed;
        };

        self.logger.info(
            CLASS_NAME,
            "run",
            "Preparing request payload for New Relic metrics API...",
        );
        let batch = match shape(&raw, &self.identity) {
            ShapeOutcome::NoData => {
                self.logger
                    .info(CLASS_NAME, "run", "No metrics are fetched to send to New Relic.");
                return CycleOutcome::NoData;
            }
            ShapeOutcome::Batch(batch) if batch.points.is_empty() => {
                self.logger.info(
                    CLASS_NAME,
                    "run",
                    "Fetched metrics carry no values to send to New Relic.",
                );
                return CycleOutcome::NothingUsable;
            }
            ShapeOutcome::Batch(batch) => batch,
        };
        self.logger.info(
            CLASS_NAME,
            "run",
            "Request payload for New Relic metrics API is prepared.",
        );

        CycleOutcome::Delivery(self.delivery.deliver(&batch, &mut self.logger).await)
    }
}
