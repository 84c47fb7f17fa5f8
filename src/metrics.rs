//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{Counter, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("propnest_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "propnest_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Listing Metrics
    pub static ref LISTINGS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "propnest_listings_created_total",
        "Total number of listings created"
    ).expect("metric can be created");
    pub static ref LISTINGS_DELETED_TOTAL: IntCounter = IntCounter::new(
        "propnest_listings_deleted_total",
        "Total number of listings deleted"
    ).expect("metric can be created");
    pub static ref SEARCHES_TOTAL: IntCounter = IntCounter::new(
        "propnest_searches_total",
        "Total number of advanced searches executed"
    ).expect("metric can be created");

    // Collaborator Metrics
    pub static ref GEOCODING_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("propnest_geocoding_requests_total", "Total number of geocoding calls"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref IMAGES_UPLOADED_TOTAL: IntCounter = IntCounter::new(
        "propnest_images_uploaded_total",
        "Total number of images uploaded"
    ).expect("metric can be created");
    pub static ref IMAGE_BYTES_UPLOADED: Counter = Counter::new(
        "propnest_image_bytes_uploaded_total",
        "Total bytes of images uploaded after resizing"
    ).expect("metric can be created");
    pub static ref EMAILS_SENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("propnest_emails_sent_total", "Total number of emails dispatched"),
        &["kind", "outcome"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("propnest_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
            .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(LISTINGS_CREATED_TOTAL.clone()))
            .expect("LISTINGS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(LISTINGS_DELETED_TOTAL.clone()))
            .expect("LISTINGS_DELETED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SEARCHES_TOTAL.clone()))
            .expect("SEARCHES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(GEOCODING_REQUESTS_TOTAL.clone()))
            .expect("GEOCODING_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(IMAGES_UPLOADED_TOTAL.clone()))
            .expect("IMAGES_UPLOADED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(IMAGE_BYTES_UPLOADED.clone()))
            .expect("IMAGE_BYTES_UPLOADED can be registered");
        REGISTRY
            .register(Box::new(EMAILS_SENT_TOTAL.clone()))
            .expect("EMAILS_SENT_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_metrics();
        init_metrics();
        SEARCHES_TOTAL.inc();
        let families = REGISTRY.gather();
        assert!(
            families
                .iter()
                .any(|family| family.get_name() == "propnest_searches_total")
        );
    }
}
