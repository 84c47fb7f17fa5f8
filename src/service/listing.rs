//! Listing service
//!
//! Create, read, update, status change and delete of listings. Mutations
//! are owner-only; the owner is fixed at creation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize, Serializer};

use super::input::{non_blank, opt_number};
use super::slug::generate_slug;
use crate::data::{
    Action, Amenity, Condition, ConstructionAge, Database, EntityId, Facing, Field,
    FurnishingStatus, Legal, Listing, ListingFilter, ListingSort, ListingStatus, Locality,
    MaintenanceFrequency, PageRequest, Photo, PossessionStatus, Pricing, PropertyDetails,
    PropertyType, PublicOwner, Role, User, VirtualTour, is_slug_conflict,
};
use crate::error::AppError;
use crate::geocoding::Geocoder;
use crate::metrics::{LISTINGS_CREATED_TOTAL, LISTINGS_DELETED_TOTAL};
use crate::storage::{ImagePipeline, UploadedImage};

/// Page size of browse, own, wishlist and enquired listings
pub const BROWSE_PAGE_SIZE: u32 = 2;

const RELATED_RADIUS_KM: f64 = 50.0;
const RELATED_LIMIT: u32 = 3;
const SLUG_ATTEMPTS: usize = 5;

// =============================================================================
// Input
// =============================================================================

/// Listing body for create and update
///
/// Absent optional fields are left untouched on update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub property_type: Option<String>,
    pub action: Option<String>,
    pub status: Option<ListingStatus>,
    /// Already stored photos; only read on update
    pub photos: Vec<Photo>,
    pub virtual_tour: Option<VirtualTour>,
    pub locality: Option<Locality>,
    pub property_details: Option<PropertyDetailsInput>,
    pub amenities: Option<Vec<Amenity>>,
    pub features: Option<BTreeMap<String, String>>,
    pub furnishing_status: Option<FurnishingStatus>,
    pub possession_status: Option<PossessionStatus>,
    pub construction_age: Option<ConstructionAge>,
    pub pricing: Option<PricingInput>,
    pub legal: Option<Legal>,
    pub inspection_time: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingInput {
    #[serde(deserialize_with = "opt_number")]
    pub price: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub maintenance_charges: Option<f64>,
    pub maintenance_frequency: Option<MaintenanceFrequency>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDetailsInput {
    #[serde(deserialize_with = "opt_number")]
    pub bedrooms: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub bathrooms: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub total_floors: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub floor_number: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub carpark: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub super_built_up_area: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub carpet_area: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub landsize: Option<f64>,
    pub landsizetype: Option<String>,
    pub facing: Option<Facing>,
}

impl PropertyDetailsInput {
    fn into_details(self) -> Result<PropertyDetails, AppError> {
        Ok(PropertyDetails {
            bedrooms: whole_count("Bedrooms", self.bedrooms)?,
            bathrooms: whole_count("Bathrooms", self.bathrooms)?,
            total_floors: whole_count("Total floors", self.total_floors)?,
            floor_number: whole_count("Floor number", self.floor_number)?,
            carpark: whole_count("Carpark", self.carpark)?,
            super_built_up_area: non_negative("Super built-up area", self.super_built_up_area)?,
            carpet_area: non_negative("Carpet area", self.carpet_area)?,
            landsize: non_negative("Land size", self.landsize)?,
            landsizetype: non_blank(self.landsizetype.as_deref()).map(str::to_string),
            facing: self.facing,
        })
    }
}

fn whole_count(label: &str, value: Option<f64>) -> Result<Option<u32>, AppError> {
    match value {
        None => Ok(None),
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Ok(Some(n as u32)),
        Some(_) => Err(AppError::Validation(format!(
            "{label} must be a non-negative whole number"
        ))),
    }
}

fn non_negative(label: &str, value: Option<f64>) -> Result<Option<f64>, AppError> {
    match value {
        None => Ok(None),
        Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
        Some(_) => Err(AppError::Validation(format!(
            "{label} must not be negative"
        ))),
    }
}

fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AppError> {
    non_blank(value).ok_or_else(|| AppError::Validation(message.to_string()))
}

/// Required fields of a listing, checked in a fixed order
#[derive(Debug, Clone)]
struct RequiredFields {
    title: String,
    description: String,
    address: String,
    property_type: PropertyType,
    action: Action,
    price: f64,
}

impl ListingInput {
    /// Check the required fields, reporting the first one missing
    fn required_fields(&self) -> Result<RequiredFields, AppError> {
        let title = required(self.title.as_deref(), "Title is required")?;
        let description = required(self.description.as_deref(), "Description is required")?;
        let address = required(self.address.as_deref(), "Address is required")?;
        let property_type = required(self.property_type.as_deref(), "Property Type is required")?
            .parse::<PropertyType>()
            .map_err(|_| AppError::Validation("Invalid property type".to_string()))?;
        let action = required(
            self.action.as_deref(),
            "Property Action (Sell/Rent) is required",
        )?
        .parse::<Action>()
        .map_err(|_| AppError::Validation("Property Action must be Sell or Rent".to_string()))?;

        let price = match self.pricing.as_ref().and_then(|pricing| pricing.price) {
            Some(price) if price != 0.0 => price,
            _ => return Err(AppError::Validation("Price is required".to_string())),
        };
        if !(price.is_finite() && price > 0.0) {
            return Err(AppError::Validation(
                "Price must be a positive number".to_string(),
            ));
        }

        Ok(RequiredFields {
            title: title.to_string(),
            description: description.to_string(),
            address: address.to_string(),
            property_type,
            action,
            price,
        })
    }

    /// Numeric and type-specific checks that follow the required fields
    fn checked_details(
        &self,
        property_type: PropertyType,
    ) -> Result<Option<PropertyDetails>, AppError> {
        if let Some(pricing) = &self.pricing {
            non_negative("Maintenance charges", pricing.maintenance_charges)?;
        }

        let details = self
            .property_details
            .clone()
            .map(PropertyDetailsInput::into_details)
            .transpose()?;

        if property_type.requires_land_size() {
            let details = details.as_ref();
            if details.and_then(|d| d.landsize).filter(|size| *size > 0.0).is_none() {
                return Err(AppError::Validation(
                    "Land size is required for Land plots".to_string(),
                ));
            }
            if details.and_then(|d| d.landsizetype.as_ref()).is_none() {
                return Err(AppError::Validation(
                    "Land size type is required for Land plots".to_string(),
                ));
            }
        }

        Ok(details)
    }
}

// =============================================================================
// Output
// =============================================================================

/// A listing with its owner's public fields in place of the owner id
#[derive(Debug, Clone)]
pub struct ListingView {
    pub listing: Listing,
    pub owner: Option<PublicOwner>,
}

impl Serialize for ListingView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error;

        let mut value = serde_json::to_value(&self.listing).map_err(S::Error::custom)?;
        if let (Some(owner), Some(object)) = (&self.owner, value.as_object_mut()) {
            let owner = serde_json::to_value(owner).map_err(S::Error::custom)?;
            object.insert("postedBy".to_string(), owner);
        }
        value.serialize(serializer)
    }
}

/// `GET /ad/:slug` payload
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    pub ad: ListingView,
    pub related: Vec<ListingView>,
}

/// One page of an internal listing collection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub ads: Vec<ListingView>,
    pub page: u32,
    pub total_pages: i64,
}

/// Attach owner projections to listings, keeping their order
pub(crate) async fn with_owners(
    db: &Database,
    listings: Vec<Listing>,
) -> Result<Vec<ListingView>, AppError> {
    let mut owner_ids: Vec<String> = listings.iter().map(|l| l.posted_by.clone()).collect();
    owner_ids.sort();
    owner_ids.dedup();

    let owners = db.get_owners(&owner_ids).await?;
    Ok(listings
        .into_iter()
        .map(|listing| {
            let owner = owners.get(&listing.posted_by).cloned();
            ListingView { listing, owner }
        })
        .collect())
}

/// Newest-first page of listings matching `filter`
pub(crate) async fn newest_page(
    db: &Database,
    filter: ListingFilter,
    page: u32,
) -> Result<ListingPage, AppError> {
    let request = PageRequest::new(page, BROWSE_PAGE_SIZE);
    let total = db.count_listings(&filter).await?;
    let listings = db
        .find_listings(&filter, &ListingSort::Newest, request)
        .await?;

    Ok(ListingPage {
        ads: with_owners(db, listings).await?,
        page: request.page,
        total_pages: request.total_pages(total),
    })
}

// =============================================================================
// Service
// =============================================================================

/// Listing lifecycle
pub struct ListingService {
    db: Arc<Database>,
    geocoder: Arc<dyn Geocoder>,
    images: Arc<ImagePipeline>,
}

impl ListingService {
    pub fn new(db: Arc<Database>, geocoder: Arc<dyn Geocoder>, images: Arc<ImagePipeline>) -> Self {
        Self {
            db,
            geocoder,
            images,
        }
    }

    /// Create a listing owned by `owner_id`
    ///
    /// # Returns
    /// The stored listing and the owner, who now holds the Seller role
    ///
    /// # Errors
    /// Nothing is stored if validation, geocoding or any image upload fails.
    pub async fn create(
        &self,
        owner_id: &str,
        input: ListingInput,
        images: Vec<UploadedImage>,
    ) -> Result<(Listing, User), AppError> {
        let fields = input.required_fields()?;
        if images.is_empty() {
            return Err(AppError::Validation(
                "At least one image is required".to_string(),
            ));
        }
        let property_details = input.checked_details(fields.property_type)?;

        let geocoded = self.geocoder.geocode(&fields.address).await?;
        let photos = self.images.store(images, owner_id).await?;
        let slug = self
            .unique_slug(fields.property_type, fields.action, &fields.address, fields.price)
            .await?;

        let now = Utc::now();
        let pricing = input.pricing.unwrap_or_default();
        let mut listing = Listing {
            id: EntityId::new().0,
            slug,
            title: fields.title,
            description: fields.description,
            photos,
            virtual_tour: input.virtual_tour,
            address: fields.address,
            location: geocoded.point.into(),
            locality: input.locality.unwrap_or_default(),
            property_type: fields.property_type,
            action: fields.action,
            status: input.status.unwrap_or_default(),
            property_details: property_details.unwrap_or_default(),
            amenities: input.amenities.unwrap_or_default(),
            features: input.features.unwrap_or_default(),
            furnishing_status: input.furnishing_status,
            possession_status: input.possession_status,
            construction_age: input.construction_age,
            pricing: Pricing::initial(
                fields.price,
                pricing.maintenance_charges,
                pricing.maintenance_frequency,
                now,
            ),
            legal: input.legal.unwrap_or_default(),
            posted_by: owner_id.to_string(),
            published: input.published.unwrap_or(true),
            inspection_time: non_blank(input.inspection_time.as_deref()).map(str::to_string),
            views: Default::default(),
            analytics: Default::default(),
            verification: Default::default(),
            featured: Default::default(),
            created_at: now,
            updated_at: now,
        };

        self.insert_with_free_slug(&mut listing, &geocoded.raw).await?;
        self.db.add_role(owner_id, Role::Seller).await?;
        let owner = self
            .db
            .get_user(owner_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        LISTINGS_CREATED_TOTAL.inc();
        tracing::info!(slug = %listing.slug, owner = %owner_id, "Listing created");

        Ok((listing, owner))
    }

    /// Fetch a listing with up to three related listings
    ///
    /// Related listings share action and property type, lie within 50 km
    /// and come nearest first. The view is recorded without failing the read.
    pub async fn read(&self, slug: &str, viewer_id: Option<&str>) -> Result<ListingDetail, AppError> {
        let listing = self
            .db
            .get_listing_by_slug(slug)
            .await?
            .ok_or(AppError::NotFound("Ad"))?;

        let center = listing.location.point();
        let related_filter = ListingFilter::new()
            .and(Condition::Published(true))
            .and(Condition::TextEq(Field::Action, listing.action.to_string()))
            .and(Condition::TextEq(
                Field::PropertyType,
                listing.property_type.to_string(),
            ))
            .and(Condition::within_km(center, RELATED_RADIUS_KM))
            .and(Condition::NotId(listing.id.clone()));
        let related = self
            .db
            .find_listings(
                &related_filter,
                &ListingSort::Nearest(center),
                PageRequest::new(1, RELATED_LIMIT),
            )
            .await?;

        if let Err(e) = self.db.record_view(&listing.id, viewer_id, Utc::now()).await {
            tracing::warn!(slug, error = %e, "Failed to record listing view");
        }

        let mut views = with_owners(&self.db, std::iter::once(listing).chain(related).collect())
            .await?
            .into_iter();
        let ad = views.next().ok_or(AppError::NotFound("Ad"))?;

        Ok(ListingDetail {
            ad,
            related: views.collect(),
        })
    }

    /// Published listings, optionally only one action
    pub async fn browse(&self, page: u32, action: Option<Action>) -> Result<ListingPage, AppError> {
        let mut filter = ListingFilter::new().and(Condition::Published(true));
        if let Some(action) = action {
            filter.push(Condition::TextEq(Field::Action, action.to_string()));
        }
        newest_page(&self.db, filter, page).await
    }

    /// Listings posted by `user_id`, published or not
    pub async fn user_listings(&self, user_id: &str, page: u32) -> Result<ListingPage, AppError> {
        let filter =
            ListingFilter::new().and(Condition::TextEq(Field::PostedBy, user_id.to_string()));
        newest_page(&self.db, filter, page).await
    }

    /// Replace the owner-editable fields of a listing
    ///
    /// The full required set is checked again. The address is geocoded only
    /// when it changed, and the slug is always regenerated.
    pub async fn update(
        &self,
        user_id: &str,
        slug: &str,
        input: ListingInput,
    ) -> Result<ListingView, AppError> {
        let fields = input.required_fields()?;
        if input.photos.is_empty() {
            return Err(AppError::Validation(
                "At least one image is required".to_string(),
            ));
        }

        let mut listing = self.owned_listing(user_id, slug).await?;
        let property_details = input.checked_details(fields.property_type)?;

        let geocoded = if fields.address != listing.address {
            Some(self.geocoder.geocode(&fields.address).await?)
        } else {
            None
        };

        let now = Utc::now();
        listing.slug = self
            .unique_slug(fields.property_type, fields.action, &fields.address, fields.price)
            .await?;
        listing.title = fields.title;
        listing.description = fields.description;
        listing.address = fields.address;
        listing.property_type = fields.property_type;
        listing.action = fields.action;
        listing.photos = input.photos;
        if let Some(geocoded) = &geocoded {
            listing.location = geocoded.point.into();
        }

        listing.pricing.set_price(fields.price, now);
        if let Some(pricing) = input.pricing {
            if pricing.maintenance_charges.is_some() {
                listing.pricing.maintenance_charges = pricing.maintenance_charges;
            }
            if pricing.maintenance_frequency.is_some() {
                listing.pricing.maintenance_frequency = pricing.maintenance_frequency;
            }
        }

        if let Some(details) = property_details {
            listing.property_details = details;
        }
        if let Some(status) = input.status {
            listing.status = status;
        }
        if input.virtual_tour.is_some() {
            listing.virtual_tour = input.virtual_tour;
        }
        if let Some(locality) = input.locality {
            listing.locality = locality;
        }
        if let Some(amenities) = input.amenities {
            listing.amenities = amenities;
        }
        if let Some(features) = input.features {
            listing.features = features;
        }
        if input.furnishing_status.is_some() {
            listing.furnishing_status = input.furnishing_status;
        }
        if input.possession_status.is_some() {
            listing.possession_status = input.possession_status;
        }
        if input.construction_age.is_some() {
            listing.construction_age = input.construction_age;
        }
        if let Some(legal) = input.legal {
            listing.legal = legal;
        }
        if let Some(inspection_time) = non_blank(input.inspection_time.as_deref()) {
            listing.inspection_time = Some(inspection_time.to_string());
        }
        if let Some(published) = input.published {
            listing.published = published;
        }
        listing.updated_at = now;

        self.update_with_free_slug(&mut listing, geocoded.as_ref().map(|g| &g.raw))
            .await?;
        tracing::info!(slug = %listing.slug, previous = %slug, owner = %user_id, "Listing updated");

        let mut views = with_owners(&self.db, vec![listing]).await?;
        views.pop().ok_or(AppError::NotFound("Ad"))
    }

    /// Replace the market status; any status may follow any other
    pub async fn update_status(
        &self,
        user_id: &str,
        slug: &str,
        status: ListingStatus,
    ) -> Result<Listing, AppError> {
        let mut listing = self.owned_listing(user_id, slug).await?;
        let now = Utc::now();
        self.db
            .update_listing_status(&listing.id, status, now)
            .await?;

        tracing::info!(slug, %status, "Listing status changed");
        listing.status = status;
        listing.updated_at = now;
        Ok(listing)
    }

    /// Delete a listing, then its stored photos
    ///
    /// Photo removal is best effort; failures are only logged.
    pub async fn delete(&self, user_id: &str, slug: &str) -> Result<(), AppError> {
        let listing = self.owned_listing(user_id, slug).await?;
        if !self.db.delete_listing(&listing.id).await? {
            return Err(AppError::NotFound("Ad"));
        }
        LISTINGS_DELETED_TOTAL.inc();
        tracing::info!(slug, owner = %user_id, "Listing deleted");

        for photo in &listing.photos {
            if let Err(e) = self.images.delete(&photo.key).await {
                tracing::warn!(slug, key = %photo.key, error = %e, "Failed to delete listing photo");
            }
        }

        Ok(())
    }

    /// Store images ahead of a create or update
    pub async fn upload_images(
        &self,
        user_id: &str,
        images: Vec<UploadedImage>,
    ) -> Result<Vec<Photo>, AppError> {
        if images.is_empty() {
            return Err(AppError::Validation("No image provided".to_string()));
        }
        self.images.store(images, user_id).await
    }

    /// Remove a stored image; only its uploader may
    ///
    /// The uploader is read back from storage, never taken from the request.
    pub async fn remove_image(&self, user_id: &str, key: &str) -> Result<(), AppError> {
        let key = non_blank(Some(key))
            .ok_or_else(|| AppError::Validation("Image key is required".to_string()))?;

        match self.images.uploader(key).await? {
            None => Err(AppError::NotFound("Image")),
            Some(uploader) if uploader != user_id => {
                tracing::warn!(key, caller = %user_id, "Rejected image removal by non-uploader");
                Err(AppError::Unauthorized)
            }
            Some(_) => self.images.delete(key).await,
        }
    }

    async fn owned_listing(&self, user_id: &str, slug: &str) -> Result<Listing, AppError> {
        let listing = self
            .db
            .get_listing_by_slug(slug)
            .await?
            .ok_or(AppError::NotFound("Ad"))?;

        if listing.posted_by != user_id {
            tracing::warn!(slug, caller = %user_id, "Rejected change by non-owner");
            return Err(AppError::Unauthorized);
        }
        Ok(listing)
    }

    async fn unique_slug(
        &self,
        property_type: PropertyType,
        action: Action,
        address: &str,
        price: f64,
    ) -> Result<String, AppError> {
        for _ in 0..SLUG_ATTEMPTS {
            let slug = generate_slug(property_type, action, address, price);
            if !self.db.slug_exists(&slug).await? {
                return Ok(slug);
            }
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "No free slug after {} attempts",
            SLUG_ATTEMPTS
        )))
    }

    async fn fresh_slug(&self, listing: &Listing) -> Result<String, AppError> {
        self.unique_slug(
            listing.property_type,
            listing.action,
            &listing.address,
            listing.pricing.price,
        )
        .await
    }

    /// Insert, drawing a new slug if a concurrent write took this one
    async fn insert_with_free_slug(
        &self,
        listing: &mut Listing,
        geocoder_payload: &serde_json::Value,
    ) -> Result<(), AppError> {
        let mut attempt = 1;
        loop {
            match self.db.insert_listing(listing, geocoder_payload).await {
                Err(e) if is_slug_conflict(&e) && attempt < SLUG_ATTEMPTS => {
                    tracing::debug!(slug = %listing.slug, "Slug claimed concurrently, retrying");
                    listing.slug = self.fresh_slug(listing).await?;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Update, drawing a new slug if a concurrent write took this one
    async fn update_with_free_slug(
        &self,
        listing: &mut Listing,
        geocoder_payload: Option<&serde_json::Value>,
    ) -> Result<(), AppError> {
        let mut attempt = 1;
        loop {
            match self.db.update_listing(listing, geocoder_payload).await {
                Err(e) if is_slug_conflict(&e) && attempt < SLUG_ATTEMPTS => {
                    tracing::debug!(slug = %listing.slug, "Slug claimed concurrently, retrying");
                    listing.slug = self.fresh_slug(listing).await?;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
