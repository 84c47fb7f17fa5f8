//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub geocoding: GeocodingConfig,
    pub email: EmailConfig,
    pub auth: AuthConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8000)
    pub port: u16,
    /// Public URL of the web client, used for links in emails
    /// e.g., "https://propnest.example.com"
    pub client_url: String,
    /// Origins allowed by CORS. Empty means any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Build a link into the web client
    ///
    /// # Example
    /// ```ignore
    /// server.client_link("reset-password/abc") // "https://propnest.example.com/reset-password/abc"
    /// ```
    pub fn client_link(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.client_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Object storage configuration (S3 or S3-compatible)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding listing and profile images
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
    /// Public URL base for stored objects
    ///
    /// Defaults to the bucket's virtual-hosted S3 URL.
    pub public_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Images larger than this box are scaled down to fit (default: 1600x900)
    pub max_image_width: u32,
    pub max_image_height: u32,
}

impl StorageConfig {
    pub fn public_url_base(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

/// Geocoding provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    pub api_key: String,
    /// Geocoding JSON endpoint (default: Google Geocoding API)
    pub endpoint: String,
}

/// Transactional email configuration (Amazon SES)
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Sender address
    pub from: String,
    /// Reply-to and support address
    pub reply_to: String,
    /// Application name shown in subjects and footers
    pub app_name: String,
    pub region: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token signing secret (32+ bytes)
    pub token_secret: String,
    /// Token max age in seconds (default: 604800 = 7 days)
    pub token_max_age: i64,
    /// Password reset token lifetime in seconds (default: 3600)
    pub reset_token_ttl: i64,
}

/// Search defaults
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Radius used when a search gives none (default: 10)
    pub default_radius_km: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (PROPNEST__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.client_url", "http://localhost:3000")?
            .set_default("database.path", "data/propnest.db")?
            .set_default("storage.max_image_width", 1600)?
            .set_default("storage.max_image_height", 900)?
            .set_default(
                "geocoding.endpoint",
                "https://maps.googleapis.com/maps/api/geocode/json",
            )?
            .set_default("email.app_name", "Propnest")?
            .set_default("auth.token_max_age", 604800)?
            .set_default("auth.reset_token_ttl", 3600)?
            .set_default("search.default_radius_km", 10.0)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (PROPNEST__*)
            .add_source(
                Environment::with_prefix("PROPNEST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_TOKEN_SECRET_BYTES: usize = 32;

        if self.auth.token_secret.as_bytes().len() < MIN_TOKEN_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.token_secret must be at least {} bytes",
                MIN_TOKEN_SECRET_BYTES
            )));
        }

        if self.auth.token_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.token_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.reset_token_ttl <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.reset_token_ttl must be greater than 0".to_string(),
            ));
        }

        if !(self.search.default_radius_km > 0.0) {
            return Err(crate::error::AppError::Config(
                "search.default_radius_km must be greater than 0".to_string(),
            ));
        }

        if self.storage.max_image_width == 0 || self.storage.max_image_height == 0 {
            return Err(crate::error::AppError::Config(
                "storage.max_image_width and storage.max_image_height must be greater than 0"
                    .to_string(),
            ));
        }

        match url::Url::parse(&self.server.client_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(crate::error::AppError::Config(format!(
                    "server.client_url must be an http(s) URL, got {:?}",
                    self.server.client_url
                )));
            }
        }

        Ok(())
    }
}
