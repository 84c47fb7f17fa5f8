//! Fixtures shared by the service tests

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use super::listing::{ListingInput, PricingInput};
use crate::data::{Database, GeoPoint, User};
use crate::error::AppError;
use crate::geocoding::{Geocoded, Geocoder};
use crate::notify::{Mailer, OutgoingEmail};
use crate::storage::{ImagePipeline, ObjectStore};

pub async fn create_test_db() -> (Arc<Database>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::connect(&temp_dir.path().join("test.db"))
        .await
        .unwrap();
    (Arc::new(db), temp_dir)
}

pub async fn seed_user(db: &Database, email: &str) -> User {
    let username = email.split('@').next().unwrap_or(email);
    let user = User::new(email, username, "not-a-hash".to_string(), Utc::now());
    db.insert_user(&user).await.unwrap();
    user
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// A complete listing body for a house for sale
pub fn listing_input(address: &str) -> ListingInput {
    ListingInput {
        title: Some("Sunny family home".to_string()),
        description: Some("Three bedrooms close to the station".to_string()),
        address: Some(address.to_string()),
        property_type: Some("Residential-House".to_string()),
        action: Some("Sell".to_string()),
        pricing: Some(PricingInput {
            price: Some(500_000.0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Resolves every address to the same point
pub struct FixedGeocoder(pub GeoPoint);

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, address: &str) -> Result<Geocoded, AppError> {
        Ok(Geocoded {
            point: self.0,
            raw: serde_json::json!([{ "formatted_address": address }]),
        })
    }
}

/// Accepts every write and delete and remembers nothing
pub struct NullStore;

#[async_trait]
impl ObjectStore for NullStore {
    async fn put(
        &self,
        key: &str,
        _data: Vec<u8>,
        _content_type: &str,
        _uploaded_by: &str,
    ) -> Result<String, AppError> {
        Ok(format!("https://media.test/{key}"))
    }

    async fn uploader(&self, _key: &str) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Keeps every email it is asked to send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub fn stub_geocoder() -> Arc<dyn Geocoder> {
    Arc::new(FixedGeocoder(GeoPoint::new(151.2093, -33.8688)))
}

pub fn stub_pipeline() -> Arc<ImagePipeline> {
    Arc::new(ImagePipeline::new(Arc::new(NullStore), 1600, 900))
}
