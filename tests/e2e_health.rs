//! E2E tests for health check and basic server functionality

mod common;

use common::TestServer;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_cors_headers() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/health"))
        .header("Origin", "https://propnest.test")
        .send()
        .await
        .unwrap();

    // No configured origins means any origin is allowed
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_404_for_unknown_routes() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/api/unknown/route"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_request_counters() {
    propnest::metrics::init_metrics();
    let server = TestServer::new().await;

    // One routed request so the counter has a sample
    server
        .client
        .get(server.url("/api/ads/1"))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert!(body.contains("propnest_http_requests_total"));
    assert!(body.contains(r#"endpoint="/api/ads/:page""#));
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/api/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}
