//! Function trigger endpoint

use axum::extract::State;
use axum::http::StatusCode;
use uuid::Uuid;

use crate::api::AppState;
use crate::core::telemetry::TelemetryLogger;

const CLASS_NAME: &str = "ForwardMetrics";

/// `GET|POST /api/ForwardMetrics`
///
/// Runs the pipeline to completion and answers 200 with an empty body,
/// whatever happened to individual instances.
pub async fn forward_metrics(State(state): State<AppState>) -> StatusCode {
    let run_id = Uuid::new_v4();
    let mut logger =
        TelemetryLogger::new(state.newrelic.clone(), state.clock.clone()).with_run_id(run_id);
    logger.info(
        CLASS_NAME,
        "forward_metrics",
        "ForwardMetrics function is started.",
    );

    // Tracked so neither a dropped connection nor shutdown cuts the run short
    let pipeline = state.pipeline.clone();
    let run = state
        .shutdown
        .spawn_tracked(async move { pipeline.run_with_id(run_id).await })
        .await;
    if let Err(e) = run.await {
        logger.unexpected(CLASS_NAME, "forward_metrics", &e);
    }

    logger.info(
        CLASS_NAME,
        "forward_metrics",
        "ForwardMetrics function is finished.",
    );
    logger.flush().await;
    StatusCode::OK
}
