//! Google Geocoding API client

use async_trait::async_trait;
use serde::Deserialize;

use super::{Geocoded, Geocoder};
use crate::config::GeocodingConfig;
use crate::data::GeoPoint;
use crate::error::AppError;
use crate::metrics::GEOCODING_REQUESTS_TOTAL;

/// Geocoder backed by the Google Geocoding JSON API
pub struct GoogleGeocoder {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GoogleGeocoder {
    pub fn new(http_client: reqwest::Client, config: &GeocodingConfig) -> Self {
        Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// Pick the first result's coordinates out of a provider response
fn parse_response(response: GeocodeResponse) -> Result<Geocoded, AppError> {
    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => {
            return Err(AppError::Geocoding("Please enter a valid address".to_string()));
        }
        status => {
            return Err(AppError::Geocoding(format!(
                "provider returned {}: {}",
                status,
                response.error_message.unwrap_or_default()
            )));
        }
    }

    let first = response
        .results
        .first()
        .ok_or_else(|| AppError::Geocoding("Please enter a valid address".to_string()))?;
    let location: LatLng = serde_json::from_value(first["geometry"]["location"].clone())
        .map_err(|e| AppError::Geocoding(format!("malformed result: {}", e)))?;

    Ok(Geocoded {
        point: GeoPoint::new(location.lng, location.lat),
        raw: serde_json::Value::Array(response.results),
    })
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    #[tracing::instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Geocoded, AppError> {
        let result = async {
            let response: GeocodeResponse = self
                .http_client
                .get(&self.endpoint)
                .query(&[("address", address), ("key", self.api_key.as_str())])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            parse_response(response)
        }
        .await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        GEOCODING_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();

        result.map_err(|e| match e {
            AppError::HttpClient(e) => AppError::Geocoding(e.to_string()),
            other => other,
        })
    }
}
