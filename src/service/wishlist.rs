//! Wishlist service
//!
//! The wishlist is a per-user set of listing ids with toggle semantics.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::listing::{ListingPage, newest_page};
use crate::data::{Condition, Database, ListingFilter, UserSet};
use crate::error::AppError;

/// Outcome of a toggle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistToggle {
    pub ok: bool,
    pub message: String,
    /// Membership after the toggle
    pub in_wishlist: bool,
    pub wishlist: Vec<String>,
}

pub struct WishlistService {
    db: Arc<Database>,
}

impl WishlistService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Flip membership of a listing in the caller's wishlist
    ///
    /// Adding also appends a shortlist entry to the listing's analytics.
    pub async fn toggle(&self, user_id: &str, listing_id: &str) -> Result<WishlistToggle, AppError> {
        if self.db.get_listing(listing_id).await?.is_none() {
            return Err(AppError::NotFound("Ad"));
        }

        let in_wishlist = self.db.toggle_wishlist(user_id, listing_id, Utc::now()).await?;
        tracing::debug!(user = %user_id, listing = %listing_id, in_wishlist, "Wishlist toggled");

        let message = if in_wishlist {
            "Ad added to wishlist"
        } else {
            "Ad removed from wishlist"
        };
        Ok(WishlistToggle {
            ok: true,
            message: message.to_string(),
            in_wishlist,
            wishlist: self.db.get_wishlist_ids(user_id).await?,
        })
    }

    /// Wishlisted listings, newest first
    pub async fn list(&self, user_id: &str, page: u32) -> Result<ListingPage, AppError> {
        let filter = ListingFilter::new().and(Condition::InUserSet {
            set: UserSet::Wishlist,
            user_id: user_id.to_string(),
        });
        newest_page(&self.db, filter, page).await
    }
}
