//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use propnest::data::GeoPoint;
use propnest::error::AppError;
use propnest::geocoding::{Geocoded, Geocoder};
use propnest::notify::{Mailer, OutgoingEmail};
use propnest::storage::ObjectStore;
use propnest::{AppState, config};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Sydney CBD, where unknown addresses resolve
pub const DEFAULT_POINT: (f64, f64) = (151.2093, -33.8688);

/// Geocoder with a fixed address book
///
/// Unknown addresses resolve to `DEFAULT_POINT`; the address `nowhere`
/// fails like a provider with zero results.
#[derive(Default)]
pub struct AddressBook {
    points: Mutex<HashMap<String, GeoPoint>>,
}

impl AddressBook {
    pub fn insert(&self, address: &str, longitude: f64, latitude: f64) {
        self.points
            .lock()
            .unwrap()
            .insert(address.to_string(), GeoPoint::new(longitude, latitude));
    }
}

#[async_trait]
impl Geocoder for AddressBook {
    async fn geocode(&self, address: &str) -> Result<Geocoded, AppError> {
        if address == "nowhere" {
            return Err(AppError::Geocoding("Please enter a valid address".to_string()));
        }
        let point = self
            .points
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or_else(|| GeoPoint::new(DEFAULT_POINT.0, DEFAULT_POINT.1));
        Ok(Geocoded {
            point,
            raw: serde_json::json!([{ "formatted_address": address }]),
        })
    }
}

/// In-memory object store; each object keeps its uploader
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryStore {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
        uploaded_by: &str,
    ) -> Result<String, AppError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, uploaded_by.to_string()));
        Ok(format!("https://media.propnest.test/{key}"))
    }

    async fn uploader(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, uploaded_by)| uploaded_by.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Mailer that keeps every message
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl Outbox {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutgoingEmail> {
        self.sent()
            .into_iter()
            .filter(|email| email.to == address)
            .collect()
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub geocoder: Arc<AddressBook>,
    pub store: Arc<MemoryStore>,
    pub outbox: Arc<Outbox>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = test_config(db_path.clone());
        let db = propnest::data::Database::connect(&db_path).await.unwrap();

        let geocoder = Arc::new(AddressBook::default());
        let store = Arc::new(MemoryStore::default());
        let outbox = Arc::new(Outbox::default());
        let state = AppState::with_collaborators(
            config,
            db,
            geocoder.clone(),
            store.clone(),
            outbox.clone(),
        );

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = propnest::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            geocoder,
            store,
            outbox,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Sign in (creating the account on first login) and return the token
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&serde_json::json!({ "email": email, "password": "secret-pw" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// POST /api/create-ad with one small PNG
    pub async fn create_listing(&self, token: &str, ad: Value) -> reqwest::Response {
        let form = reqwest::multipart::Form::new()
            .text("ad", ad.to_string())
            .part(
                "images",
                reqwest::multipart::Part::bytes(png(8, 8))
                    .file_name("front.png")
                    .mime_str("image/png")
                    .unwrap(),
            );
        self.client
            .post(self.url("/api/create-ad"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    /// Create a listing that must succeed and return its JSON
    pub async fn seed_listing(&self, token: &str, ad: Value) -> Value {
        let response = self.create_listing(token, ad).await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["ad"].clone()
    }
}

/// A complete listing body
pub fn listing_json(address: &str, property_type: &str, action: &str, price: f64) -> Value {
    serde_json::json!({
        "title": format!("{property_type} at {address}"),
        "description": "Bright and close to transport",
        "address": address,
        "propertyType": property_type,
        "action": action,
        "pricing": { "price": price },
        "propertyDetails": { "bedrooms": 3, "bathrooms": 2 }
    })
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn test_config(db_path: std::path::PathBuf) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            client_url: "https://propnest.test".to_string(),
            cors_allowed_origins: vec![],
        },
        database: config::DatabaseConfig { path: db_path },
        storage: config::StorageConfig {
            bucket: "test-media".to_string(),
            region: "ap-southeast-2".to_string(),
            endpoint: None,
            public_url: Some("https://media.propnest.test".to_string()),
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
            max_image_width: 1600,
            max_image_height: 900,
        },
        geocoding: config::GeocodingConfig {
            api_key: "test-maps-key".to_string(),
            endpoint: "https://geocode.invalid/json".to_string(),
        },
        email: config::EmailConfig {
            from: "no-reply@propnest.test".to_string(),
            reply_to: "support@propnest.test".to_string(),
            app_name: "Propnest".to_string(),
            region: "ap-southeast-2".to_string(),
        },
        auth: config::AuthConfig {
            token_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            token_max_age: 604_800,
            reset_token_ttl: 3_600,
        },
        search: config::SearchConfig {
            default_radius_km: 10.0,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
