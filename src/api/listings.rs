//! Listing endpoints
//!
//! Create, read, browse, update, delete and status changes, plus the
//! standalone image upload/removal used by the listing editor.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::extract::{ApiJson, MultipartForm, page_number};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{Action, Listing, ListingStatus, Photo, User};
use crate::error::AppError;
use crate::service::{ListingDetail, ListingInput, ListingPage, ListingService, ListingView};

/// Multipart part carrying the listing JSON
const AD_FIELD: &str = "ad";
/// Multipart parts carrying listing images
const IMAGE_FIELDS: &[&str] = &["images", "image"];

#[derive(Debug, Serialize)]
pub struct CreatedListingResponse {
    pub success: bool,
    pub message: &'static str,
    pub ad: Listing,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UpdatedListingResponse {
    pub success: bool,
    pub message: &'static str,
    pub ad: ListingView,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub ad: Listing,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ListingStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveImageRequest {
    #[serde(default)]
    pub key: String,
}

/// POST /api/create-ad
///
/// Multipart body: the listing JSON in the `ad` part and one or more
/// image files in `images` parts.
pub async fn create_listing(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    multipart: Multipart,
) -> Result<Json<CreatedListingResponse>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = listing_from_form(&form)?;
    let images = form.take_files(IMAGE_FIELDS);

    let (ad, user) = build_listing_service(&state)
        .create(&session.user_id, input, images)
        .await?;

    Ok(Json(CreatedListingResponse {
        success: true,
        message: "Property listing created successfully",
        ad,
        user,
    }))
}

/// GET /api/ad/:slug
pub async fn get_listing(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<ListingDetail>, AppError> {
    let viewer = session.as_ref().map(|s| s.user_id.as_str());
    let detail = build_listing_service(&state).read(&slug, viewer).await?;
    Ok(Json(detail))
}

/// GET /api/ads/:page?action=Sell|Rent
///
/// An unknown action is ignored rather than rejected.
pub async fn browse_listings(
    State(state): State<AppState>,
    Path(page): Path<String>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<ListingPage>, AppError> {
    let action = query
        .action
        .as_deref()
        .and_then(|action| action.trim().parse::<Action>().ok());
    let listings = build_listing_service(&state)
        .browse(page_number(&page), action)
        .await?;
    Ok(Json(listings))
}

/// GET /api/user-ads/:page
pub async fn user_listings(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(page): Path<String>,
) -> Result<Json<ListingPage>, AppError> {
    let listings = build_listing_service(&state)
        .user_listings(&session.user_id, page_number(&page))
        .await?;
    Ok(Json(listings))
}

/// PUT /api/update-ad/:slug
pub async fn update_listing(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(slug): Path<String>,
    ApiJson(input): ApiJson<ListingInput>,
) -> Result<Json<UpdatedListingResponse>, AppError> {
    let ad = build_listing_service(&state)
        .update(&session.user_id, &slug, input)
        .await?;

    Ok(Json(UpdatedListingResponse {
        success: true,
        message: "Property listing updated successfully",
        ad,
    }))
}

/// PUT /api/update-ad-status/:slug
pub async fn update_listing_status(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(slug): Path<String>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let ad = build_listing_service(&state)
        .update_status(&session.user_id, &slug, request.status)
        .await?;
    Ok(Json(StatusResponse { ok: true, ad }))
}

/// DELETE /api/delete-ad/:slug
pub async fn delete_listing(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    build_listing_service(&state)
        .delete(&session.user_id, &slug)
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

/// POST /api/upload-image
pub async fn upload_images(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let results = build_listing_service(&state)
        .upload_images(&session.user_id, form.take_files(IMAGE_FIELDS))
        .await?;
    Ok(Json(UploadResponse { results }))
}

/// DELETE /api/remove-image
pub async fn remove_image(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    ApiJson(request): ApiJson<RemoveImageRequest>,
) -> Result<Json<OkResponse>, AppError> {
    build_listing_service(&state)
        .remove_image(&session.user_id, &request.key)
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

fn listing_from_form(form: &MultipartForm) -> Result<ListingInput, AppError> {
    let Some(raw) = form.text(AD_FIELD) else {
        return Ok(ListingInput::default());
    };
    serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("Invalid listing data: {}", e)))
}

fn build_listing_service(state: &AppState) -> ListingService {
    ListingService::new(
        state.db.clone(),
        state.geocoder.clone(),
        state.images.clone(),
    )
}
