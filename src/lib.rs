//! Propnest - a real-estate classifieds API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Listing, search, wishlist and enquiry endpoints          │
//! │  - Account endpoints                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Validation, ownership checks, search translation         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │        Data Layer        │   │        Collaborators         │
//! │  - SQLite (sqlx)         │   │  - Geocoder (Google)         │
//! │  - Geo filter → SQL      │   │  - Object store (S3)         │
//! │                          │   │  - Mailer (SES)              │
//! └──────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Models, listing filters and the SQLite store
//! - `geocoding`: Address lookup
//! - `storage`: Image pipeline and S3 object store
//! - `notify`: Transactional email
//! - `auth`: Session tokens and password hashing
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod geocoding;
pub mod metrics;
pub mod notify;
pub mod service;
pub mod storage;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request. Collaborators sit behind trait objects so the
/// integration tests can swap in fakes.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Address lookup
    pub geocoder: Arc<dyn geocoding::Geocoder>,

    /// Resize + upload of listing and profile images
    pub images: Arc<storage::ImagePipeline>,

    /// Transactional email
    pub notifier: Arc<notify::Notifier>,
}

impl AppState {
    /// Initialize application state with the production collaborators
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Build the HTTP client and geocoder
    /// 3. Build the S3 object store and image pipeline
    /// 4. Build the SES mailer
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Propnest/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;
        let geocoder = geocoding::GoogleGeocoder::new(http_client, &config.geocoding);

        let store = storage::S3MediaStorage::new(&config.storage);
        tracing::info!(bucket = %config.storage.bucket, "Object storage initialized");

        let mailer = notify::SesMailer::new(&config.email, &config.storage);
        tracing::info!(region = %config.email.region, "Mailer initialized");

        Ok(Self::with_collaborators(
            config,
            db,
            Arc::new(geocoder),
            Arc::new(store),
            Arc::new(mailer),
        ))
    }

    /// Assemble state from already-built collaborators
    pub fn with_collaborators(
        config: config::AppConfig,
        db: data::Database,
        geocoder: Arc<dyn geocoding::Geocoder>,
        store: Arc<dyn storage::ObjectStore>,
        mailer: Arc<dyn notify::Mailer>,
    ) -> Self {
        let images = storage::ImagePipeline::new(
            store,
            config.storage.max_image_width,
            config.storage.max_image_height,
        );
        let templates = notify::Templates::new(
            &config.email.app_name,
            &config.server.client_url,
            &config.email.reply_to,
        );

        Self {
            config: Arc::new(config),
            db: Arc::new(db),
            geocoder,
            images: Arc::new(images),
            notifier: Arc::new(notify::Notifier::new(mailer, templates)),
        }
    }
}

/// Multipart bodies carry several images
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, extract::DefaultBodyLimit};
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::api_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if server.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_config;
    use crate::service::test_support::{NullStore, RecordingMailer, stub_geocoder};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    async fn test_router(config: config::AppConfig) -> (axum::Router, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let db = data::Database::connect(&dir.path().join("router.db"))
            .await
            .unwrap();
        let state = AppState::with_collaborators(
            config,
            db,
            stub_geocoder(),
            Arc::new(NullStore),
            Arc::new(RecordingMailer::default()),
        );
        (build_router(state), dir)
    }

    #[tokio::test]
    async fn health_route_answers_ok() {
        let (router, _dir) = test_router(valid_config()).await;
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn configured_origins_restrict_cors() {
        let mut config = valid_config();
        config.server.cors_allowed_origins = vec!["https://propnest.example.com".to_string()];
        let (router, _dir) = test_router(config).await;

        let response = router
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "https://propnest.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://propnest.example.com"
        );
    }

    #[tokio::test]
    async fn protected_routes_reject_anonymous_callers() {
        let (router, _dir) = test_router(valid_config()).await;
        let response = router
            .oneshot(Request::get("/api/current-user").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
