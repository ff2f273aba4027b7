//! API server initialization

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::middleware;
use super::routes::{health, trigger};
use crate::core::config::ServerConfig;
use crate::core::constants::TRIGGER_ROUTE;
use crate::core::shutdown::ShutdownService;
use crate::data::newrelic::NewRelicClient;
use crate::domain::metrics::ForwardPipeline;
use crate::utils::time::Clock;

/// Shared by every request
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ForwardPipeline>,
    pub newrelic: NewRelicClient,
    pub clock: Arc<dyn Clock>,
    pub shutdown: ShutdownService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            TRIGGER_ROUTE,
            get(trigger::forward_metrics).post(trigger::forward_metrics),
        )
        .route("/api/v1/health", get(health::health))
        .fallback(middleware::handle_404)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    /// Bind the listening socket; failures surface before anything is spawned
    pub async fn bind(config: &ServerConfig, state: AppState) -> Result<Self> {
        let addr = SocketAddr::new(
            config
                .host
                .parse()
                .with_context(|| format!("Invalid server host: {}", config.host))?,
            config.port,
        );
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::debug!(%addr, "HTTP listener bound");

        Ok(Self {
            listener,
            router: router(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::secret::Secret;
    use crate::data::azure::{AzureCredential, AzureMonitorClient};
    use crate::data::config_source::FileConfigSource;
    use crate::data::newrelic::NewRelicSettings;
    use crate::domain::inventory::ConfigReader;
    use crate::domain::metrics::PipelineConfig;
    use crate::utils::time::SystemClock;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use httpmock::prelude::*;
    use tower::ServiceExt;

    fn state(server: &MockServer, dir: &tempfile::TempDir) -> AppState {
        let newrelic = NewRelicClient::new(
            reqwest::Client::new(),
            NewRelicSettings {
                metrics_url: server.url("/metric/v1"),
                logs_url: server.url("/log/v1"),
                api_key: Secret::new("license"),
            },
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let backend = AzureMonitorClient::new(
            reqwest::Client::new(),
            server.base_url(),
            Arc::new(AzureCredential::Static(Secret::new("tok"))),
        );
        let reader = ConfigReader::new(
            Box::new(FileConfigSource::new(dir.path())),
            newrelic.clone(),
            clock.clone(),
        );
        let pipeline = ForwardPipeline::new(
            reader,
            Arc::new(backend),
            newrelic.clone(),
            clock.clone(),
            PipelineConfig::default(),
        );

        AppState {
            pipeline: Arc::new(pipeline),
            newrelic,
            clock,
            shutdown: ShutdownService::default(),
        }
    }

    fn empty_inventory() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"subscriptions":[]}"#).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start_async().await;
        let dir = empty_inventory();

        let resp = router(state(&server, &dir))
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_trigger_runs_pipeline_and_returns_empty_ok() {
        let server = MockServer::start_async().await;
        let trigger_logs = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/log/v1")
                    .body_includes("ForwardMetrics function is started.")
                    .body_includes("ForwardMetrics function is finished.");
                then.status(202);
            })
            .await;
        let run_logs = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/log/v1")
                    .body_includes("has finished.");
                then.status(202);
            })
            .await;
        let dir = empty_inventory();

        let resp = router(state(&server, &dir))
            .oneshot(
                Request::post(TRIGGER_ROUTE)
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        trigger_logs.assert_calls_async(1).await;
        run_logs.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_trigger_accepts_get() {
        let server = MockServer::start_async().await;
        let dir = empty_inventory();

        let resp = router(state(&server, &dir))
            .oneshot(Request::get(TRIGGER_ROUTE).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = MockServer::start_async().await;
        let dir = empty_inventory();

        let resp = router(state(&server, &dir))
            .oneshot(Request::get("/api/Nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_and_serve_until_shutdown() {
        let server = MockServer::start_async().await;
        let dir = empty_inventory();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        let api = ApiServer::bind(&config, state(&server, &dir)).await.unwrap();
        let addr = api.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(api.serve(async move {
            let _ = rx.await;
        }));

        let resp = reqwest::get(format!("http://{}/api/v1/health", addr)).await.unwrap();
        assert!(resp.status().is_success());

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
