//! Listing filters
//!
//! A `ListingFilter` is a conjunction of conditions over listing documents.
//! Conditions can only be added, never removed, so a filter with more
//! conditions always selects a subset of one with fewer.
//!
//! Translation to SQL pushes bound parameters through `sqlx::QueryBuilder`;
//! the only text spliced into the statement comes from the static column
//! expressions below.

use std::ops::Bound;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::models::GeoPoint;

/// Mean equatorial radius used to turn kilometers into radians
pub const EARTH_RADIUS_KM: f64 = 6378.1;

/// Scalar listing fields that can be compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    PropertyType,
    Action,
    FurnishingStatus,
    PossessionStatus,
    ConstructionAge,
    PostedBy,
    Price,
    MaintenanceFrequency,
    Bedrooms,
    Bathrooms,
    TotalFloors,
    FloorNumber,
    Carpark,
    Facing,
    SuperBuiltUpArea,
    CarpetArea,
    Ownership,
    ReraNumber,
    ViewType,
}

impl Field {
    fn sql(&self) -> &'static str {
        match self {
            Self::PropertyType => "listings.property_type",
            Self::Action => "listings.action",
            Self::FurnishingStatus => "listings.furnishing_status",
            Self::PossessionStatus => "listings.possession_status",
            Self::ConstructionAge => "listings.construction_age",
            Self::PostedBy => "listings.posted_by",
            Self::Price => "json_extract(listings.pricing, '$.price')",
            Self::MaintenanceFrequency => {
                "json_extract(listings.pricing, '$.maintenanceFrequency')"
            }
            Self::Bedrooms => "json_extract(listings.property_details, '$.bedrooms')",
            Self::Bathrooms => "json_extract(listings.property_details, '$.bathrooms')",
            Self::TotalFloors => "json_extract(listings.property_details, '$.totalFloors')",
            Self::FloorNumber => "json_extract(listings.property_details, '$.floorNumber')",
            Self::Carpark => "json_extract(listings.property_details, '$.carpark')",
            Self::Facing => "json_extract(listings.property_details, '$.facing')",
            Self::SuperBuiltUpArea => {
                "json_extract(listings.property_details, '$.superBuiltUpArea')"
            }
            Self::CarpetArea => "json_extract(listings.property_details, '$.carpetArea')",
            Self::Ownership => "json_extract(listings.legal, '$.ownership')",
            Self::ReraNumber => "json_extract(listings.legal, '$.reraNumber')",
            Self::ViewType => "json_extract(listings.features, '$.view')",
        }
    }
}

/// JSON collections on a listing that support membership tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Amenities,
    Landmarks,
    /// Values of the features map
    Features,
}

impl Collection {
    fn sql(&self) -> &'static str {
        match self {
            Self::Amenities => "json_each(listings.amenities)",
            Self::Landmarks => "json_each(listings.locality, '$.landmarks')",
            Self::Features => "json_each(listings.features)",
        }
    }
}

/// Per-user reference sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSet {
    Wishlist,
    Enquired,
}

impl UserSet {
    fn table(&self) -> &'static str {
        match self {
            Self::Wishlist => "wishlist_items",
            Self::Enquired => "enquired_listings",
        }
    }
}

/// A single predicate over a listing
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Published(bool),
    /// Spherical containment: angular distance from `center` at most `radians`
    WithinRadius { center: GeoPoint, radians: f64 },
    TextEq(Field, String),
    NumberEq(Field, f64),
    NumberRange {
        field: Field,
        lower: Bound<f64>,
        upper: Bound<f64>,
    },
    CreatedSince(DateTime<Utc>),
    Verified,
    Featured,
    /// At least one of the values is present
    AnyOf(Collection, Vec<String>),
    /// Every value is present
    AllOf(Collection, Vec<String>),
    /// None of the values is present
    NoneOf(Collection, Vec<String>),
    InUserSet { set: UserSet, user_id: String },
    NotId(String),
}

impl Condition {
    /// Radius search condition for a distance in kilometers
    pub fn within_km(center: GeoPoint, radius_km: f64) -> Self {
        Self::WithinRadius {
            center,
            radians: radius_km / EARTH_RADIUS_KM,
        }
    }
}

/// Conjunction of conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    conditions: Vec<Condition>,
}

impl ListingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition (AND)
    pub fn and(mut self, condition: Condition) -> Self {
        self.push(condition);
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Append ` WHERE ...` (or nothing when empty) to a query
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        for (index, condition) in self.conditions.iter().enumerate() {
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            push_condition(builder, condition);
        }
    }
}

fn push_unit_dot(builder: &mut QueryBuilder<'_, Sqlite>, center: &GeoPoint) {
    let [x, y, z] = center.unit_vector();
    builder.push("(listings.unit_x * ");
    builder.push_bind(x);
    builder.push(" + listings.unit_y * ");
    builder.push_bind(y);
    builder.push(" + listings.unit_z * ");
    builder.push_bind(z);
    builder.push(")");
}

fn push_values(builder: &mut QueryBuilder<'_, Sqlite>, values: &[String]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

fn push_condition(builder: &mut QueryBuilder<'_, Sqlite>, condition: &Condition) {
    match condition {
        Condition::Published(published) => {
            builder.push("listings.published = ");
            builder.push_bind(*published);
        }
        Condition::WithinRadius { center, radians } => {
            // Beyond half the globe everything matches
            let min_dot = if *radians >= std::f64::consts::PI {
                -1.0
            } else {
                radians.cos()
            };
            push_unit_dot(builder, center);
            builder.push(" >= ");
            builder.push_bind(min_dot);
        }
        Condition::TextEq(field, value) => {
            builder.push(field.sql());
            builder.push(" = ");
            builder.push_bind(value.clone());
        }
        Condition::NumberEq(field, value) => {
            builder.push(field.sql());
            builder.push(" = ");
            builder.push_bind(*value);
        }
        Condition::NumberRange {
            field,
            lower,
            upper,
        } => {
            builder.push("(");
            builder.push(field.sql());
            builder.push(" IS NOT NULL");
            match lower {
                Bound::Included(value) => {
                    builder.push(" AND ").push(field.sql()).push(" >= ");
                    builder.push_bind(*value);
                }
                Bound::Excluded(value) => {
                    builder.push(" AND ").push(field.sql()).push(" > ");
                    builder.push_bind(*value);
                }
                Bound::Unbounded => {}
            }
            match upper {
                Bound::Included(value) => {
                    builder.push(" AND ").push(field.sql()).push(" <= ");
                    builder.push_bind(*value);
                }
                Bound::Excluded(value) => {
                    builder.push(" AND ").push(field.sql()).push(" < ");
                    builder.push_bind(*value);
                }
                Bound::Unbounded => {}
            }
            builder.push(")");
        }
        Condition::CreatedSince(since) => {
            builder.push("listings.created_at >= ");
            builder.push_bind(*since);
        }
        Condition::Verified => {
            builder.push("listings.is_verified = 1");
        }
        Condition::Featured => {
            builder.push("listings.is_featured = 1");
        }
        Condition::AnyOf(collection, values) => {
            builder.push("EXISTS (SELECT 1 FROM ");
            builder.push(collection.sql());
            builder.push(" WHERE value IN ");
            push_values(builder, values);
            builder.push(")");
        }
        Condition::AllOf(collection, values) => {
            let mut distinct = values.clone();
            distinct.sort();
            distinct.dedup();
            builder.push("(SELECT COUNT(DISTINCT value) FROM ");
            builder.push(collection.sql());
            builder.push(" WHERE value IN ");
            push_values(builder, &distinct);
            builder.push(") = ");
            builder.push_bind(distinct.len() as i64);
        }
        Condition::NoneOf(collection, values) => {
            builder.push("NOT EXISTS (SELECT 1 FROM ");
            builder.push(collection.sql());
            builder.push(" WHERE value IN ");
            push_values(builder, values);
            builder.push(")");
        }
        Condition::InUserSet { set, user_id } => {
            builder.push("listings.id IN (SELECT listing_id FROM ");
            builder.push(set.table());
            builder.push(" WHERE user_id = ");
            builder.push_bind(user_id.clone());
            builder.push(")");
        }
        Condition::NotId(id) => {
            builder.push("listings.id <> ");
            builder.push_bind(id.clone());
        }
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListingSort {
    PriceAsc,
    PriceDesc,
    Newest,
    Oldest,
    /// Most viewed first, newest first among equals
    Views,
    /// Featured first, newest first among equals
    Featured,
    /// Geographically nearest to the point first
    Nearest(GeoPoint),
}

impl ListingSort {
    pub fn push_order_by(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" ORDER BY ");
        match self {
            Self::PriceAsc => {
                builder.push("json_extract(listings.pricing, '$.price') ASC");
            }
            Self::PriceDesc => {
                builder.push("json_extract(listings.pricing, '$.price') DESC");
            }
            Self::Newest => {
                builder.push("listings.created_at DESC");
            }
            Self::Oldest => {
                builder.push("listings.created_at ASC");
            }
            Self::Views => {
                builder.push("listings.views_total DESC, listings.created_at DESC");
            }
            Self::Featured => {
                builder.push("listings.is_featured DESC, listings.created_at DESC");
            }
            Self::Nearest(center) => {
                push_unit_dot(builder, center);
                builder.push(" DESC");
            }
        }
        // Stable paging among equal keys
        builder.push(", listings.id DESC");
    }
}

/// Offset pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// ceil(total / page_size)
    pub fn total_pages(&self, total: i64) -> i64 {
        let size = i64::from(self.page_size);
        (total + size - 1) / size
    }
}
