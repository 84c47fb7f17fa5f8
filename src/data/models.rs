//! Data models
//!
//! Rust structs representing listings, users and the rows they are loaded from.
//! All models use ULID for IDs and chrono for timestamps. Wire names are
//! camelCase to match the JSON the web client exchanges.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Closed vocabularies
// =============================================================================

/// Declares a closed string vocabulary.
///
/// Each variant serializes (JSON and SQLite TEXT) as its exact display text.
macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:tt),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                #[sqlx(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

vocabulary! {
    /// Kind of property being advertised
    PropertyType {
        ResidentialApartment => "Residential-Apartment",
        ResidentialHouse => "Residential-House",
        ResidentialVilla => "Residential-Villa",
        CommercialOffice => "Commercial-Office",
        CommercialShop => "Commercial-Shop",
        CommercialWarehouse => "Commercial-Warehouse",
        Industrial => "Industrial",
        LandPlot => "Land-Plot",
        Agricultural => "Agricultural",
    }
}

impl PropertyType {
    /// Types that are sold by land area and need `landsize` + `landsizetype`
    pub fn requires_land_size(&self) -> bool {
        matches!(self, Self::LandPlot)
    }
}

vocabulary! {
    /// Whether the listing is for sale or for rent
    Action {
        Sell => "Sell",
        Rent => "Rent",
    }
}

vocabulary! {
    /// Market state of a listing. Any state may move to any other.
    ListingStatus {
        InMarket => "In market",
        DepositTaken => "Deposit taken",
        Sold => "Sold",
        UnderOffer => "Under offer",
        ContactAgent => "Contact agent",
        Rented => "Rented",
        OffMarket => "Off market",
    }
}

impl Default for ListingStatus {
    fn default() -> Self {
        Self::InMarket
    }
}

vocabulary! {
    Facing {
        North => "North",
        South => "South",
        East => "East",
        West => "West",
        NorthEast => "North-East",
        NorthWest => "North-West",
        SouthEast => "South-East",
        SouthWest => "South-West",
    }
}

vocabulary! {
    FurnishingStatus {
        Unfurnished => "Unfurnished",
        SemiFurnished => "Semi-Furnished",
        FullyFurnished => "Fully-Furnished",
    }
}

vocabulary! {
    PossessionStatus {
        ReadyToMove => "Ready to Move",
        UnderConstruction => "Under Construction",
    }
}

vocabulary! {
    ConstructionAge {
        UnderConstruction => "Under Construction",
        UpToOneYear => "0-1 years",
        OneToFiveYears => "1-5 years",
        FiveToTenYears => "5-10 years",
        OverTenYears => "10+ years",
    }
}

vocabulary! {
    Amenity {
        Parking => "Parking",
        Gym => "Gym",
        SwimmingPool => "Swimming Pool",
        Security => "Security",
        PowerBackup => "Power Backup",
        Lift => "Lift",
        ClubHouse => "Club House",
        Garden => "Garden",
        Intercom => "Intercom",
        ChildrenPlayArea => "Children Play Area",
        FireSafety => "Fire Safety",
        VisitorParking => "Visitor Parking",
        WaterSupply => "Water Supply 24/7",
        ShoppingCenter => "Shopping Center",
        LoadingDocks => "Loading Docks",
    }
}

vocabulary! {
    MaintenanceFrequency {
        Monthly => "Monthly",
        Quarterly => "Quarterly",
        Yearly => "Yearly",
    }
}

vocabulary! {
    Ownership {
        Freehold => "Freehold",
        Leasehold => "Leasehold",
        PowerOfAttorney => "Power of Attorney",
        CoOperativeSociety => "Co-operative Society",
    }
}

vocabulary! {
    NearbyPlaceKind {
        School => "School",
        Hospital => "Hospital",
        Mall => "Mall",
        Metro => "Metro",
        BusStop => "Bus Stop",
        Park => "Park",
    }
}

vocabulary! {
    /// Account role. Every user starts as a Buyer.
    Role {
        Buyer => "Buyer",
        Seller => "Seller",
        Admin => "Admin",
    }
}

// =============================================================================
// Geospatial
// =============================================================================

/// A point on the earth's surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Unit vector of the point on the sphere.
    ///
    /// Two points are within angular distance `θ` iff the dot product of their
    /// unit vectors is at least `cos θ`.
    pub fn unit_vector(&self) -> [f64; 3] {
        let lon = self.longitude.to_radians();
        let lat = self.latitude.to_radians();
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }
}

/// GeoJSON point as exposed on a listing: `coordinates` is always `[lon, lat]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl From<GeoPoint> for Location {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [point.longitude, point.latitude],
        }
    }
}

impl Location {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.coordinates[0], self.coordinates[1])
    }
}

// =============================================================================
// Listing sub-documents
// =============================================================================

/// Stored photo reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub url: String,
    pub key: String,
    pub uploaded_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualTour {
    pub url: String,
    /// e.g. "3D Tour", "360 View", "Video Tour"
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlace {
    #[serde(rename = "type")]
    pub kind: NearbyPlaceKind,
    pub name: String,
    /// Kilometers
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Locality {
    pub landmarks: Vec<String>,
    pub nearby_places: Vec<NearbyPlace>,
}

/// Numeric specifications. Counts are unsigned; areas are validated non-negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDetails {
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub total_floors: Option<u32>,
    pub floor_number: Option<u32>,
    pub carpark: Option<u32>,
    pub super_built_up_area: Option<f64>,
    pub carpet_area: Option<f64>,
    pub landsize: Option<f64>,
    pub landsizetype: Option<String>,
    pub facing: Option<Facing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub price: f64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub price: f64,
    #[serde(default)]
    pub maintenance_charges: Option<f64>,
    #[serde(default)]
    pub maintenance_frequency: Option<MaintenanceFrequency>,
    /// Append-only: an entry is added whenever the price changes
    #[serde(default)]
    pub price_history: Vec<PriceHistoryEntry>,
}

impl Pricing {
    /// Pricing for a new listing, history seeded with the initial price
    pub fn initial(
        price: f64,
        maintenance_charges: Option<f64>,
        maintenance_frequency: Option<MaintenanceFrequency>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            price,
            maintenance_charges,
            maintenance_frequency,
            price_history: vec![PriceHistoryEntry { price, date: now }],
        }
    }

    /// Set the price, appending to the history only when it actually changes
    pub fn set_price(&mut self, price: f64, now: DateTime<Utc>) {
        if self.price != price {
            self.price = price;
            self.price_history.push(PriceHistoryEntry { price, date: now });
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Legal {
    pub ownership: Option<Ownership>,
    pub approvals: Vec<String>,
    pub rera_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewStats {
    pub total: i64,
    /// Number of distinct signed-in viewers
    pub unique: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub last_viewed: Option<DateTime<Utc>>,
    pub contact_requests: i64,
    pub shortlists: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub verification_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Featured {
    pub is_featured: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

// =============================================================================
// Listing
// =============================================================================

/// A property advertisement
///
/// `posted_by` is set at creation and never changes. Analytics are only ever
/// incremented or appended to through dedicated store operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub photos: Vec<Photo>,
    pub virtual_tour: Option<VirtualTour>,
    pub address: String,
    pub location: Location,
    pub locality: Locality,
    pub property_type: PropertyType,
    pub action: Action,
    pub status: ListingStatus,
    pub property_details: PropertyDetails,
    pub amenities: Vec<Amenity>,
    pub features: BTreeMap<String, String>,
    pub furnishing_status: Option<FurnishingStatus>,
    pub possession_status: Option<PossessionStatus>,
    pub construction_age: Option<ConstructionAge>,
    pub pricing: Pricing,
    pub legal: Legal,
    pub posted_by: String,
    pub published: bool,
    pub inspection_time: Option<String>,
    pub views: ViewStats,
    pub analytics: Analytics,
    pub verification: Verification,
    pub featured: Featured,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `listings` row plus the analytics counts computed in the SELECT
#[derive(Debug, sqlx::FromRow)]
pub struct ListingRow {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub address: String,
    pub property_type: PropertyType,
    pub action: Action,
    pub status: ListingStatus,
    pub furnishing_status: Option<FurnishingStatus>,
    pub possession_status: Option<PossessionStatus>,
    pub construction_age: Option<ConstructionAge>,
    pub inspection_time: Option<String>,
    pub published: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub photos: Json<Vec<Photo>>,
    pub virtual_tour: Option<Json<VirtualTour>>,
    pub locality: Json<Locality>,
    pub property_details: Json<PropertyDetails>,
    pub amenities: Json<Vec<Amenity>>,
    pub features: Json<BTreeMap<String, String>>,
    pub pricing: Json<Pricing>,
    pub legal: Json<Legal>,
    pub posted_by: String,
    pub views_total: i64,
    pub unique_viewers: i64,
    pub contact_requests: i64,
    pub shortlists: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub featured_from: Option<DateTime<Utc>>,
    pub featured_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            photos: row.photos.0,
            virtual_tour: row.virtual_tour.map(|tour| tour.0),
            address: row.address,
            location: GeoPoint::new(row.longitude, row.latitude).into(),
            locality: row.locality.0,
            property_type: row.property_type,
            action: row.action,
            status: row.status,
            property_details: row.property_details.0,
            amenities: row.amenities.0,
            features: row.features.0,
            furnishing_status: row.furnishing_status,
            possession_status: row.possession_status,
            construction_age: row.construction_age,
            pricing: row.pricing.0,
            legal: row.legal.0,
            posted_by: row.posted_by,
            published: row.published,
            inspection_time: row.inspection_time,
            views: ViewStats {
                total: row.views_total,
                unique: row.unique_viewers,
            },
            analytics: Analytics {
                last_viewed: row.last_viewed_at,
                contact_requests: row.contact_requests,
                shortlists: row.shortlists,
            },
            verification: Verification {
                is_verified: row.is_verified,
                verified_by: row.verified_by,
                verification_date: row.verified_at,
            },
            featured: Featured {
                is_featured: row.is_featured,
                start_date: row.featured_from,
                end_date: row.featured_until,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Users
// =============================================================================

/// A registered user
///
/// The password hash and reset token never leave the service layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub about: Option<String>,
    pub photo: Option<String>,
    pub logo: Option<String>,
    #[serde(rename = "role")]
    pub roles: Vec<Role>,
    pub wishlist: Vec<String>,
    pub enquired_properties: Vec<String>,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub reset_password_token: Option<String>,
    #[serde(skip)]
    pub reset_password_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh account holding only the Buyer role
    pub fn new(email: &str, username: &str, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new().0,
            email: email.to_string(),
            username: username.to_string(),
            name: None,
            phone: None,
            company: None,
            address: None,
            about: None,
            photo: None,
            logo: None,
            roles: vec![Role::Buyer],
            wishlist: Vec::new(),
            enquired_properties: Vec::new(),
            password_hash,
            reset_password_token: None,
            reset_password_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `users` row; roles and reference sets live in their own tables
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub about: Option<String>,
    pub photo: Option<String>,
    pub logo: Option<String>,
    pub reset_password_token: Option<String>,
    pub reset_password_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_user(self, roles: Vec<Role>, wishlist: Vec<String>, enquired: Vec<String>) -> User {
        User {
            id: self.id,
            email: self.email,
            username: self.username,
            name: self.name,
            phone: self.phone,
            company: self.company,
            address: self.address,
            about: self.about,
            photo: self.photo,
            logo: self.logo,
            roles,
            wishlist,
            enquired_properties: enquired,
            password_hash: self.password_hash,
            reset_password_token: self.reset_password_token,
            reset_password_expires_at: self.reset_password_expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Owner fields attached to listing responses. Nothing sensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicOwner {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Option<String>,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub photo: Option<String>,
    pub logo: Option<String>,
}

/// Profile fields that may be changed; `None` leaves the stored value alone
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub about: Option<String>,
    pub photo: Option<String>,
    pub logo: Option<String>,
}
