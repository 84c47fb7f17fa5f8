//! Wishlist endpoints

use axum::{
    extract::{Path, State},
    response::Json,
};

use super::extract::page_number;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{ListingPage, WishlistService, WishlistToggle};

/// PUT /api/toggle-wish-list/:adId
pub async fn toggle_wishlist(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(listing_id): Path<String>,
) -> Result<Json<WishlistToggle>, AppError> {
    let toggled = WishlistService::new(state.db.clone())
        .toggle(&session.user_id, &listing_id)
        .await?;
    Ok(Json(toggled))
}

/// GET /api/wishlist/:page
pub async fn wishlist(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(page): Path<String>,
) -> Result<Json<ListingPage>, AppError> {
    let listings = WishlistService::new(state.db.clone())
        .list(&session.user_id, page_number(&page))
        .await?;
    Ok(Json(listings))
}
