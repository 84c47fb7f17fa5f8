//! Error types for Propnest
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Message returned for every upstream failure
pub const UPSTREAM_MESSAGE: &str = "Something went wrong. Please try again.";

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    ///
    /// Carries the kind of resource, e.g. "Ad".
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Authentication required or caller is not the owner (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Validation error (400)
    #[error("{0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Geocoding provider failure or unresolvable address (502)
    #[error("Geocoding error: {0}")]
    Geocoding(String),

    /// Object storage error (502)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Email dispatch error (502)
    #[error("Email error: {0}")]
    Email(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Label used for the error metric
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::Geocoding(_) => "geocoding",
            AppError::Storage(_) => "storage",
            AppError::Email(_) => "email",
            AppError::HttpClient(_) => "http_client",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Geocoding(_)
            | AppError::Storage(_)
            | AppError::Email(_)
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Client errors carry their own message. Upstream and internal
    /// details are logged and replaced by a generic message.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let error_message = match &self {
            AppError::NotFound(_) | AppError::Unauthorized | AppError::Validation(_) => {
                self.to_string()
            }
            AppError::Geocoding(_)
            | AppError::Storage(_)
            | AppError::Email(_)
            | AppError::HttpClient(_) => {
                tracing::error!(error = %self, "Upstream call failed");
                UPSTREAM_MESSAGE.to_string()
            }
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Internal error");
                "Internal server error".to_string()
            }
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
