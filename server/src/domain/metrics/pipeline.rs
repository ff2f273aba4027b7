//! Run orchestration
//!
//! Reads the inventory, fans out one [`MetricProcessor`] per instance on a
//! [`JoinSet`] gated by a semaphore, and waits for every one of them.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::PipelineConfig;
use super::deliver::{DeliveryOutcome, MetricDelivery};
use super::processor::{CycleOutcome, MetricProcessor};
use super::query::MetricQuery;
use crate::core::telemetry::TelemetryLogger;
use crate::data::azure::MetricsBackend;
use crate::data::newrelic::NewRelicClient;
use crate::domain::inventory::{ConfigReader, InstanceIdentity};
use crate::utils::time::Clock;

const CLASS_NAME: &str = "ForwardPipeline";

#[derive(Debug, Default)]
struct RunSummary {
    instances: usize,
    delivered: usize,
    rejected: usize,
    failed: usize,
    empty: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Delivery(DeliveryOutcome::Delivered) => self.delivered += 1,
            CycleOutcome::Delivery(DeliveryOutcome::Rejected(_)) => self.rejected += 1,
            CycleOutcome::Delivery(DeliveryOutcome::Error(_)) | CycleOutcome::QueryFailed => {
                self.failed += 1
            }
            CycleOutcome::NoData | CycleOutcome::NothingUsable => self.empty += 1,
        }
    }
}

pub struct ForwardPipeline {
    reader: ConfigReader,
    backend: Arc<dyn MetricsBackend>,
    newrelic: NewRelicClient,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl ForwardPipeline {
    pub fn new(
        reader: ConfigReader,
        backend: Arc<dyn MetricsBackend>,
        newrelic: NewRelicClient,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            reader,
            backend,
            newrelic,
            clock,
            config,
        }
    }

    /// One complete forwarding run. Never fails; every problem ends up in
    /// the run's telemetry.
    pub async fn run(&self) {
        self.run_with_id(Uuid::new_v4()).await
    }

    /// Same as [`run`](Self::run), tagging telemetry with a caller-chosen id
    pub async fn run_with_id(&self, run_id: Uuid) {
        let mut logger = self.logger(run_id);
        logger.info(
            CLASS_NAME,
            "run",
            "Processing all Postgres DB metrics in parallel has started.",
        );

        if let Some(config) = self.reader.read(run_id).await {
            let summary = self.fan_out(config.instances(), run_id, &mut logger).await;
            tracing::info!(
                %run_id,
                instances = summary.instances,
                delivered = summary.delivered,
                rejected = summary.rejected,
                failed = summary.failed,
                empty = summary.empty,
                "Forwarding run complete"
            );
            logger.info(
                CLASS_NAME,
                "run",
                "Processing all Postgres DB metrics in parallel has finished.",
            );
        }

        logger.flush().await;
    }

    /// Run every instance and wait for all of them.
    ///
    /// A processor that panics is reported once, as an unexpected error in the
    /// run-level sink. The records it had buffered for its own instance are
    /// lost with it, since its sink is never flushed.
    async fn fan_out(
        &self,
        instances: Vec<InstanceIdentity>,
        run_id: Uuid,
        logger: &mut TelemetryLogger,
    ) -> RunSummary {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut summary = RunSummary {
            instances: instances.len(),
            ..RunSummary::default()
        };

        for identity in instances {
            let processor = self.processor(identity, run_id);
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                processor.run().await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    summary.failed += 1;
                    logger.unexpected(CLASS_NAME, "run", &e);
                }
            }
        }
        summary
    }

    fn processor(&self, identity: InstanceIdentity, run_id: Uuid) -> MetricProcessor {
        MetricProcessor::new(
            identity,
            MetricQuery::new(
                self.backend.clone(),
                self.clock.clone(),
                self.config.query_timeout,
            ),
            MetricDelivery::new(self.newrelic.clone(), self.config.delivery_timeout),
            self.logger(run_id),
        )
    }

    fn logger(&self, run_id: Uuid) -> TelemetryLogger {
        TelemetryLogger::new(self.newrelic.clone(), self.clock.clone()).with_run_id(run_id)
    }
}
