//! Buffered telemetry sink
//!
//! Every stage of a run records structured log records into its own
//! [`TelemetryLogger`]. Records are mirrored to `tracing` as they are written
//! and shipped to the New Relic Log API as one batch by [`TelemetryLogger::flush`].
//! A logger is owned by exactly one unit of work; nothing here is shared.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::constants::APP_NAME;
use crate::data::newrelic::{Attributes, NewRelicClient, NewRelicLog};
use crate::domain::inventory::InstanceIdentity;
use crate::utils::time::{Clock, to_unix_millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Information,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Information => "Information",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attribution-tagged event
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub class_name: &'static str,
    pub method_name: &'static str,
    pub level: LogLevel,
    pub time_utc: DateTime<Utc>,
    pub message: String,
    pub exception: Option<String>,
    pub stack_trace: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group_name: Option<String>,
    pub database_name: Option<String>,
}

impl LogRecord {
    /// Log API line; empty or absent attributes are left out
    pub fn to_new_relic(&self) -> NewRelicLog {
        let mut attributes = Attributes::new();
        attributes.insert("className".to_string(), self.class_name.to_string());
        attributes.insert("methodName".to_string(), self.method_name.to_string());
        attributes.insert("logLevel".to_string(), self.level.as_str().to_string());

        let optional = [
            ("subscriptionId", &self.subscription_id),
            ("resourceGroupName", &self.resource_group_name),
            ("databaseName", &self.database_name),
            ("exception", &self.exception),
            ("stackTrace", &self.stack_trace),
        ];
        for (key, value) in optional {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                attributes.insert(key.to_string(), v.to_string());
            }
        }

        NewRelicLog {
            message: self.message.clone(),
            timestamp: to_unix_millis(&self.time_utc),
            attributes,
        }
    }

    fn emit_trace(&self) {
        let database = self.database_name.as_deref();
        let exception = self.exception.as_deref();
        match self.level {
            LogLevel::Information => tracing::info!(
                class = self.class_name,
                method = self.method_name,
                database,
                "{}",
                self.message
            ),
            LogLevel::Error => tracing::error!(
                class = self.class_name,
                method = self.method_name,
                database,
                exception,
                stack_trace = self.stack_trace.as_deref(),
                "{}",
                self.message
            ),
        }
    }
}

/// Render the `source()` chain of an error, one cause per line.
/// Returns `None` when the error has no underlying cause.
pub fn error_chain(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        lines.push(format!("caused by: {}", cause));
        current = cause.source();
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// In-memory log buffer for one unit of work
pub struct TelemetryLogger {
    client: NewRelicClient,
    clock: Arc<dyn Clock>,
    common: Attributes,
    instance: Option<InstanceIdentity>,
    records: Vec<LogRecord>,
}

impl TelemetryLogger {
    pub fn new(client: NewRelicClient, clock: Arc<dyn Clock>) -> Self {
        let mut common = Attributes::new();
        common.insert("service".to_string(), APP_NAME.to_string());
        Self {
            client,
            clock,
            common,
            instance: None,
            records: Vec::new(),
        }
    }

    /// Tag the whole batch with the run it belongs to
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.common.insert("runId".to_string(), run_id.to_string());
        self
    }

    /// Attribute every record to one instance
    pub fn with_instance(mut self, instance: InstanceIdentity) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn info(
        &mut self,
        class_name: &'static str,
        method_name: &'static str,
        message: impl Into<String>,
    ) {
        let record = self.record(LogLevel::Information, class_name, method_name, message);
        self.log(record);
    }

    pub fn error(
        &mut self,
        class_name: &'static str,
        method_name: &'static str,
        message: impl Into<String>,
        exception: impl Into<String>,
        stack_trace: Option<String>,
    ) {
        let mut record = self.record(LogLevel::Error, class_name, method_name, message);
        record.exception = Some(exception.into());
        record.stack_trace = stack_trace;
        self.log(record);
    }

    /// "Unexpected error occurred." with the error message and its cause chain
    pub fn unexpected(
        &mut self,
        class_name: &'static str,
        method_name: &'static str,
        err: &(dyn StdError + 'static),
    ) {
        self.error(
            class_name,
            method_name,
            "Unexpected error occurred.",
            err.to_string(),
            error_chain(err),
        );
    }

    pub fn log(&mut self, record: LogRecord) {
        record.emit_trace();
        self.records.push(record);
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Ship all buffered records in one request and clear the buffer.
    ///
    /// Failures are reported through `tracing` only; the batch is dropped.
    pub async fn flush(&mut self) {
        let records = std::mem::take(&mut self.records);
        if records.is_empty() {
            tracing::trace!("No telemetry records to flush");
            return;
        }

        let logs: Vec<NewRelicLog> = records.iter().map(LogRecord::to_new_relic).collect();
        match self.client.send_logs(Some(&self.common), &logs).await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(count = logs.len(), "Flushed telemetry records");
            }
            Ok(resp) => {
                tracing::warn!(
                    status = %resp.status(),
                    count = logs.len(),
                    "Log API rejected telemetry batch"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, count = logs.len(), "Failed to flush telemetry records");
            }
        }
    }

    fn record(
        &self,
        level: LogLevel,
        class_name: &'static str,
        method_name: &'static str,
        message: impl Into<String>,
    ) -> LogRecord {
        let instance = self.instance.as_ref();
        LogRecord {
            class_name,
            method_name,
            level,
            time_utc: self.clock.now(),
            message: message.into(),
            exception: None,
            stack_trace: None,
            subscription_id: instance.map(|i| i.subscription_id().to_string()),
            resource_group_name: instance.map(|i| i.resource_group_name().to_string()),
            database_name: instance.map(|i| i.database_name().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::secret::Secret;
    use crate::data::newrelic::NewRelicSettings;
    use crate::utils::time::FixedClock;
    use chrono::TimeZone;
    use httpmock::prelude::*;

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()))
    }

    fn logger_for(server: &MockServer) -> TelemetryLogger {
        let client = NewRelicClient::new(
            reqwest::Client::new(),
            NewRelicSettings {
                metrics_url: server.url("/metric/v1"),
                logs_url: server.url("/log/v1"),
                api_key: Secret::new("key"),
            },
        );
        TelemetryLogger::new(client, fixed_clock())
    }

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("outer failure")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("inner cause")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    impl StdError for Inner {}

    #[test]
    fn test_record_omits_empty_attributes() {
        let record = LogRecord {
            class_name: "MetricProcessor",
            method_name: "run",
            level: LogLevel::Information,
            time_utc: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            message: "hello".to_string(),
            exception: Some(String::new()),
            stack_trace: None,
            subscription_id: Some("sub".to_string()),
            resource_group_name: None,
            database_name: None,
        };

        let line = record.to_new_relic();
        assert_eq!(line.timestamp, 1_704_067_200_000);
        assert_eq!(line.attributes["className"], "MetricProcessor");
        assert_eq!(line.attributes["methodName"], "run");
        assert_eq!(line.attributes["logLevel"], "Information");
        assert_eq!(line.attributes["subscriptionId"], "sub");
        assert!(!line.attributes.contains_key("exception"));
        assert!(!line.attributes.contains_key("resourceGroupName"));
        assert!(!line.attributes.contains_key("stackTrace"));
    }

    #[test]
    fn test_with_instance_tags_records() {
        let server = MockServer::start();
        let mut logger =
            logger_for(&server).with_instance(InstanceIdentity::new("sub", "rg", "db"));

        logger.info("MetricProcessor", "run", "started");

        let record = &logger.records()[0];
        assert_eq!(record.subscription_id.as_deref(), Some("sub"));
        assert_eq!(record.resource_group_name.as_deref(), Some("rg"));
        assert_eq!(record.database_name.as_deref(), Some("db"));
    }

    #[test]
    fn test_unexpected_captures_cause_chain() {
        let server = MockServer::start();
        let mut logger = logger_for(&server);

        logger.unexpected("MetricProcessor", "run", &Outer(Inner));

        let record = &logger.records()[0];
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.message, "Unexpected error occurred.");
        assert_eq!(record.exception.as_deref(), Some("outer failure"));
        assert_eq!(record.stack_trace.as_deref(), Some("caused by: inner cause"));
    }

    #[test]
    fn test_error_chain_none_without_source() {
        assert!(error_chain(&Inner).is_none());
    }

    #[tokio::test]
    async fn test_flush_sends_batch_and_clears_buffer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/log/v1")
                    .header("Api-Key", "key")
                    .body_includes("\"runId\"")
                    .body_includes("first")
                    .body_includes("second");
                then.status(202);
            })
            .await;

        let mut logger = logger_for(&server).with_run_id(Uuid::new_v4());
        logger.info("A", "b", "first");
        logger.info("A", "b", "second");
        logger.flush().await;

        mock.assert_calls_async(1).await;
        assert!(logger.records().is_empty());
    }

    #[tokio::test]
    async fn test_flush_empty_buffer_sends_nothing() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/log/v1");
                then.status(202);
            })
            .await;

        let mut logger = logger_for(&server);
        logger.flush().await;

        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_flush_failure_is_absorbed() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/log/v1");
                then.status(500).body("down");
            })
            .await;

        let mut logger = logger_for(&server);
        logger.info("A", "b", "lost");
        logger.flush().await;

        mock.assert_calls_async(1).await;
        assert!(logger.records().is_empty());
    }
}
