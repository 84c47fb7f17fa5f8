//! Geocoding adapter
//!
//! Turns a free-text address into a point on the map. The provider is
//! reached through the `Geocoder` trait so that handlers and tests never
//! depend on a concrete HTTP client.

mod google;

pub use google::GoogleGeocoder;

use async_trait::async_trait;

use crate::data::GeoPoint;
use crate::error::AppError;

/// A resolved address
#[derive(Debug, Clone, PartialEq)]
pub struct Geocoded {
    pub point: GeoPoint,
    /// Provider response, stored alongside the listing for reference
    pub raw: serde_json::Value,
}

/// Address lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve an address to its best match
    ///
    /// # Errors
    /// `AppError::Geocoding` if the provider fails or finds nothing
    async fn geocode(&self, address: &str) -> Result<Geocoded, AppError>;
}
