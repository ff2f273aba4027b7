//! HTTP middleware (404 handler)

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Fallback for unknown routes; logs the request at debug level
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!(method = %req.method(), uri = %req.uri(), "[404] No route");
    StatusCode::NOT_FOUND
}
