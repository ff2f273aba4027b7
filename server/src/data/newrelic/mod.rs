//! New Relic ingestion client
//!
//! Thin wrapper over a shared `reqwest::Client` that knows the Metric and Log
//! API endpoints and attaches the license key. Response classification is
//! left to callers.

mod types;

pub use types::{Attributes, Common, LogEnvelope, MetricEnvelope, NewRelicLog};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::constants::{DEFAULT_LOG_FLUSH_TIMEOUT_SECS, NEW_RELIC_API_KEY_HEADER};
use crate::core::secret::Secret;

/// Endpoints and credentials for New Relic ingestion
#[derive(Debug, Clone)]
pub struct NewRelicSettings {
    pub metrics_url: String,
    pub logs_url: String,
    pub api_key: Secret,
}

/// Cloneable handle; clones share the connection pool and settings
#[derive(Debug, Clone)]
pub struct NewRelicClient {
    http: reqwest::Client,
    settings: Arc<NewRelicSettings>,
    log_timeout: Duration,
}

impl NewRelicClient {
    pub fn new(http: reqwest::Client, settings: NewRelicSettings) -> Self {
        Self {
            http,
            settings: Arc::new(settings),
            log_timeout: Duration::from_secs(DEFAULT_LOG_FLUSH_TIMEOUT_SECS),
        }
    }

    /// Upper bound on one Log API request, connect to last body byte
    pub fn with_log_timeout(mut self, timeout: Duration) -> Self {
        self.log_timeout = timeout;
        self
    }

    /// POST one metric envelope to the Metric API
    pub async fn send_metrics<P: Serialize + Sync>(
        &self,
        attributes: &Attributes,
        points: &[P],
    ) -> Result<reqwest::Response, reqwest::Error> {
        let body = [MetricEnvelope {
            common: Common { attributes },
            metrics: points,
        }];
        self.post(&self.settings.metrics_url, &body, None).await
    }

    /// POST one log envelope to the Log API
    pub async fn send_logs(
        &self,
        common: Option<&Attributes>,
        logs: &[NewRelicLog],
    ) -> Result<reqwest::Response, reqwest::Error> {
        let body = [LogEnvelope {
            common: common.map(|attributes| Common { attributes }),
            logs,
        }];
        self.post(&self.settings.logs_url, &body, Some(self.log_timeout)).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .http
            .post(url)
            .header(NEW_RELIC_API_KEY_HEADER, self.settings.api_key.expose())
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        request.send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> NewRelicClient {
        NewRelicClient::new(
            reqwest::Client::new(),
            NewRelicSettings {
                metrics_url: server.url("/metric/v1"),
                logs_url: server.url("/log/v1"),
                api_key: Secret::new("test-key"),
            },
        )
    }

    #[tokio::test]
    async fn test_send_metrics_posts_envelope_with_api_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/metric/v1")
                    .header("Api-Key", "test-key")
                    .body_includes("\"databaseName\":\"db1\"");
                then.status(202);
            })
            .await;

        let mut attributes = Attributes::new();
        attributes.insert("databaseName".to_string(), "db1".to_string());
        let points: [serde_json::Value; 0] = [];

        let resp = client_for(&server)
            .send_metrics(&attributes, &points)
            .await
            .unwrap();

        assert!(resp.status().is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_logs_posts_to_log_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/log/v1")
                    .header("Api-Key", "test-key")
                    .body_includes("\"message\":\"hello\"");
                then.status(202);
            })
            .await;

        let logs = vec![NewRelicLog {
            message: "hello".to_string(),
            timestamp: 1,
            attributes: Attributes::new(),
        }];

        client_for(&server).send_logs(None, &logs).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_logs_gives_up_after_log_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/log/v1");
                then.status(202).delay(Duration::from_secs(5));
            })
            .await;

        let client = client_for(&server).with_log_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = client.send_logs(None, &[]).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
