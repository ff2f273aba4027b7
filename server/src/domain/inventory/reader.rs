use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use super::MonitoringConfig;
use crate::core::constants::DEFAULT_CONFIG_FETCH_TIMEOUT_SECS;
use crate::core::telemetry::TelemetryLogger;
use crate::data::config_source::{ConfigSource, ConfigSourceError};
use crate::data::newrelic::NewRelicClient;
use crate::utils::time::Clock;

const CLASS_NAME: &str = "ConfigReader";

#[derive(Error, Debug)]
pub enum ConfigReadError {
    #[error(transparent)]
    Source(#[from] ConfigSourceError),

    #[error("Malformed config document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Config fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Fetches and parses `config.json`, reporting into a sink of its own
pub struct ConfigReader {
    source: Box<dyn ConfigSource>,
    newrelic: NewRelicClient,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl ConfigReader {
    pub fn new(source: Box<dyn ConfigSource>, newrelic: NewRelicClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            newrelic,
            clock,
            timeout: Duration::from_secs(DEFAULT_CONFIG_FETCH_TIMEOUT_SECS),
        }
    }

    /// Bound on fetching the document, credential acquisition included
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `None` when the document cannot be fetched or parsed; the cause is logged.
    pub async fn read(&self, run_id: Uuid) -> Option<MonitoringConfig> {
        let mut logger =
            TelemetryLogger::new(self.newrelic.clone(), self.clock.clone()).with_run_id(run_id);

        logger.info(CLASS_NAME, "read", "Reading configuration file...");
        tracing::debug!(location = %self.source.describe(), "Fetching monitoring config");

        let config = match self.fetch_and_parse().await {
            Ok(config) => {
                logger.info(CLASS_NAME, "read", "Configuration file is read.");
                Some(config)
            }
            Err(e) => {
                logger.unexpected(CLASS_NAME, "read", &e);
                None
            }
        };

        logger.flush().await;
        config
    }

    async fn fetch_and_parse(&self) -> Result<MonitoringConfig, ConfigReadError> {
        let bytes = tokio::time::timeout(self.timeout, self.source.fetch())
            .await
            .map_err(|_| ConfigReadError::Timeout(self.timeout))??;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
