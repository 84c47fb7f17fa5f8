//! Prometheus metrics endpoint and request instrumentation
//!
//! Exposes application metrics in Prometheus format for monitoring and observability.

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL, REGISTRY};

/// Metrics endpoint handler
///
/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

/// Create metrics router
///
/// Exposes the `/metrics` endpoint.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(metrics_handler))
}

/// Count and time every routed request
///
/// Requests are labelled with the route pattern (e.g. `/api/ad/:slug`) so
/// that slugs and ids do not explode the label set.
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method.as_str(), endpoint.as_str()])
        .start_timer();
    let response = next.run(request).await;
    timer.observe_duration();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[
            method.as_str(),
            endpoint.as_str(),
            response.status().as_str(),
        ])
        .inc();

    response
}
