//! Advanced listing search
//!
//! Turns the client's filter object into a `ListingFilter`. The base filter
//! is "published and within the radius of the geocoded address"; every
//! other option adds one more condition when present, so supplying more
//! options can only narrow the result.

use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::input::{non_blank, opt_number, string_list};
use super::listing::{ListingView, with_owners};
use crate::data::{
    Collection, Condition, Database, Field, GeoPoint, ListingFilter, ListingSort, PageRequest,
};
use crate::error::AppError;
use crate::geocoding::Geocoder;
use crate::metrics::SEARCHES_TOTAL;

/// Page size of search results
pub const SEARCH_PAGE_SIZE: u32 = 12;

// =============================================================================
// Filter object
// =============================================================================

/// Search request body
///
/// Every field is optional except `address`. Numbers may be sent as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub address: Option<String>,
    pub property_type: Option<String>,
    pub action: Option<String>,
    #[serde(deserialize_with = "opt_number")]
    pub page: Option<f64>,
    pub sort_by: Option<String>,
    /// Echoed back only; the direction is part of `sort_by`
    pub sort_order: Option<String>,
    /// Kilometers
    #[serde(deserialize_with = "opt_number")]
    pub radius: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub min_price: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub max_price: Option<f64>,
    pub property_details: DetailFilters,
    pub area_range: AreaRange,
    pub furnishing_status: Option<String>,
    pub possession_status: Option<String>,
    pub construction_age: Option<String>,
    /// Any of these
    #[serde(deserialize_with = "string_list")]
    pub amenities: Vec<String>,
    /// All of these
    #[serde(deserialize_with = "string_list")]
    pub required_amenities: Vec<String>,
    pub view_type: Option<String>,
    pub legal: LegalFilters,
    /// `24h`, `7d`, `30d` or `90d`
    pub posted_within: Option<String>,
    pub location_preferences: LocationPreferences,
    pub verified_only: Option<bool>,
    pub featured_only: Option<bool>,
    pub maintenance_frequency: Option<String>,
    #[serde(deserialize_with = "string_list")]
    pub special_features: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailFilters {
    #[serde(deserialize_with = "opt_number")]
    pub bedrooms: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub bathrooms: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub total_floors: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub carpark: Option<f64>,
    pub facing: Option<String>,
    /// `Low` (up to 5), `Mid` (6 to 12) or `High` (above 12)
    pub floor_preference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AreaRange {
    #[serde(deserialize_with = "opt_number")]
    pub min_area: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub max_area: Option<f64>,
    /// `carpet`; anything else selects the super built-up area
    pub area_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegalFilters {
    pub ownership: Option<String>,
    pub rera_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationPreferences {
    /// Listing must have at least one of these landmarks
    #[serde(deserialize_with = "string_list")]
    pub preferred: Vec<String>,
    /// Listing must have none of these landmarks
    #[serde(deserialize_with = "string_list")]
    pub excluded: Vec<String>,
}

// =============================================================================
// Query construction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FloorBucket {
    Low,
    Mid,
    High,
}

impl FloorBucket {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "Low" => Some(Self::Low),
            "Mid" => Some(Self::Mid),
            "High" => Some(Self::High),
            _ => None,
        }
    }

    fn bounds(&self) -> (Bound<f64>, Bound<f64>) {
        match self {
            Self::Low => (Bound::Unbounded, Bound::Included(5.0)),
            Self::Mid => (Bound::Excluded(5.0), Bound::Included(12.0)),
            Self::High => (Bound::Excluded(12.0), Bound::Unbounded),
        }
    }
}

fn posted_within(value: &str) -> Option<Duration> {
    match value {
        "24h" => Some(Duration::hours(24)),
        "7d" => Some(Duration::days(7)),
        "30d" => Some(Duration::days(30)),
        "90d" => Some(Duration::days(90)),
        _ => None,
    }
}

fn sort_key(value: Option<&str>) -> ListingSort {
    match value {
        Some("price_asc") => ListingSort::PriceAsc,
        Some("price_desc") => ListingSort::PriceDesc,
        Some("oldest") => ListingSort::Oldest,
        Some("views") => ListingSort::Views,
        Some("featured") => ListingSort::Featured,
        _ => ListingSort::Newest,
    }
}

fn range(lower: Option<f64>, upper: Option<f64>) -> Option<(Bound<f64>, Bound<f64>)> {
    if lower.is_none() && upper.is_none() {
        return None;
    }
    Some((
        lower.map_or(Bound::Unbounded, Bound::Included),
        upper.map_or(Bound::Unbounded, Bound::Included),
    ))
}

/// A search ready to run
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub filter: ListingFilter,
    pub sort: ListingSort,
    pub page: PageRequest,
    pub radius_km: f64,
}

/// Build the store query for already geocoded filters
///
/// `default_radius_km` applies when the filters carry no usable radius.
pub fn build_query(
    filters: &SearchFilters,
    center: GeoPoint,
    default_radius_km: f64,
    now: DateTime<Utc>,
) -> SearchQuery {
    let radius_km = filters
        .radius
        .filter(|radius| radius.is_finite() && *radius > 0.0)
        .unwrap_or(default_radius_km);

    let mut filter = ListingFilter::new()
        .and(Condition::Published(true))
        .and(Condition::within_km(center, radius_km));

    let text_filters = [
        (Field::Action, &filters.action),
        (Field::PropertyType, &filters.property_type),
        (Field::FurnishingStatus, &filters.furnishing_status),
        (Field::PossessionStatus, &filters.possession_status),
        (Field::ConstructionAge, &filters.construction_age),
        (Field::Facing, &filters.property_details.facing),
        (Field::Ownership, &filters.legal.ownership),
        (Field::ReraNumber, &filters.legal.rera_number),
        (Field::MaintenanceFrequency, &filters.maintenance_frequency),
        (Field::ViewType, &filters.view_type),
    ];
    for (field, value) in text_filters {
        if let Some(value) = non_blank(value.as_deref()) {
            filter.push(Condition::TextEq(field, value.to_string()));
        }
    }

    if let Some((lower, upper)) = range(filters.min_price, filters.max_price) {
        filter.push(Condition::NumberRange {
            field: Field::Price,
            lower,
            upper,
        });
    }

    let area_field = match filters.area_range.area_type.as_deref() {
        Some("carpet") => Field::CarpetArea,
        _ => Field::SuperBuiltUpArea,
    };
    if let Some((lower, upper)) = range(filters.area_range.min_area, filters.area_range.max_area) {
        filter.push(Condition::NumberRange {
            field: area_field,
            lower,
            upper,
        });
    }

    let details = &filters.property_details;
    let number_filters = [
        (Field::Bedrooms, details.bedrooms),
        (Field::Bathrooms, details.bathrooms),
        (Field::TotalFloors, details.total_floors),
        (Field::Carpark, details.carpark),
    ];
    for (field, value) in number_filters {
        if let Some(value) = value {
            filter.push(Condition::NumberEq(field, value));
        }
    }

    if let Some(bucket) = details.floor_preference.as_deref().and_then(FloorBucket::parse) {
        let (lower, upper) = bucket.bounds();
        filter.push(Condition::NumberRange {
            field: Field::FloorNumber,
            lower,
            upper,
        });
    }

    if filters.verified_only == Some(true) {
        filter.push(Condition::Verified);
    }
    if filters.featured_only == Some(true) {
        filter.push(Condition::Featured);
    }

    if let Some(window) = filters.posted_within.as_deref().and_then(posted_within) {
        filter.push(Condition::CreatedSince(now - window));
    }

    if !filters.amenities.is_empty() {
        filter.push(Condition::AnyOf(
            Collection::Amenities,
            filters.amenities.clone(),
        ));
    }
    if !filters.required_amenities.is_empty() {
        filter.push(Condition::AllOf(
            Collection::Amenities,
            filters.required_amenities.clone(),
        ));
    }

    let preferences = &filters.location_preferences;
    if !preferences.preferred.is_empty() {
        filter.push(Condition::AnyOf(
            Collection::Landmarks,
            preferences.preferred.clone(),
        ));
    }
    if !preferences.excluded.is_empty() {
        filter.push(Condition::NoneOf(
            Collection::Landmarks,
            preferences.excluded.clone(),
        ));
    }

    if !filters.special_features.is_empty() {
        filter.push(Condition::AnyOf(
            Collection::Features,
            filters.special_features.clone(),
        ));
    }

    let page = filters
        .page
        .filter(|page| page.is_finite() && *page >= 1.0)
        .map_or(1, |page| page.min(f64::from(u32::MAX)) as u32);

    SearchQuery {
        filter,
        sort: sort_key(filters.sort_by.as_deref()),
        page: PageRequest::new(page, SEARCH_PAGE_SIZE),
        radius_km,
    }
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub applied_filters: SearchFilters,
    pub sort_by: String,
    pub sort_order: String,
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub success: bool,
    pub ads: Vec<ListingView>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
    pub filters: AppliedFilters,
}

/// Search service
pub struct SearchService {
    db: Arc<Database>,
    geocoder: Arc<dyn Geocoder>,
    default_radius_km: f64,
}

impl SearchService {
    pub fn new(db: Arc<Database>, geocoder: Arc<dyn Geocoder>, default_radius_km: f64) -> Self {
        Self {
            db,
            geocoder,
            default_radius_km,
        }
    }

    /// Geocode the address and run the search
    ///
    /// # Errors
    /// Fails as a whole when the address is missing or cannot be geocoded
    pub async fn search(&self, filters: SearchFilters) -> Result<SearchResults, AppError> {
        let address = non_blank(filters.address.as_deref())
            .ok_or_else(|| AppError::Validation("Address is required".to_string()))?;
        let geocoded = self.geocoder.geocode(address).await?;

        let query = build_query(&filters, geocoded.point, self.default_radius_km, Utc::now());
        let total = self.db.count_listings(&query.filter).await?;
        let listings = self
            .db
            .find_listings(&query.filter, &query.sort, query.page)
            .await?;

        SEARCHES_TOTAL.inc();
        tracing::debug!(
            conditions = query.filter.conditions().len(),
            total,
            page = query.page.page,
            "Search executed"
        );

        Ok(SearchResults {
            success: true,
            ads: with_owners(&self.db, listings).await?,
            total,
            page: query.page.page,
            page_size: query.page.page_size,
            total_pages: query.page.total_pages(total),
            filters: AppliedFilters {
                sort_by: filters.sort_by.clone().unwrap_or_else(|| "newest".to_string()),
                sort_order: filters.sort_order.clone().unwrap_or_else(|| "desc".to_string()),
                radius: query.radius_km,
                applied_filters: filters,
            },
        })
    }
}
