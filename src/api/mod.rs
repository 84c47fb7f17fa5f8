//! API layer
//!
//! HTTP handlers for:
//! - Listings (create, read, browse, edit, images)
//! - Search
//! - Wishlist and enquiries
//! - Account (login, password reset, profile)
//! - Metrics (Prometheus)

mod account;
mod enquiry;
pub mod extract;
mod listings;
pub mod metrics;
mod search;
mod wishlist;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::AppState;

pub use metrics::metrics_router;

/// Create the `/api` router
///
/// Authentication is enforced per handler by the `CurrentUser` extractor;
/// `MaybeUser` routes accept anonymous callers.
pub fn api_router() -> Router<AppState> {
    let listing_routes = Router::new()
        .route("/create-ad", post(listings::create_listing))
        .route("/ad/:slug", get(listings::get_listing))
        .route("/ads/:page", get(listings::browse_listings))
        .route("/user-ads/:page", get(listings::user_listings))
        .route("/update-ad/:slug", put(listings::update_listing))
        .route(
            "/update-ad-status/:slug",
            put(listings::update_listing_status),
        )
        .route("/delete-ad/:slug", delete(listings::delete_listing))
        .route("/upload-image", post(listings::upload_images))
        .route("/remove-image", delete(listings::remove_image))
        .route("/search-ads", post(search::search_listings));

    let member_routes = Router::new()
        .route("/toggle-wish-list/:ad_id", put(wishlist::toggle_wishlist))
        .route("/wishlist/:page", get(wishlist::wishlist))
        .route("/contact-agent", post(enquiry::contact_agent))
        .route("/enquired-ads/:page", get(enquiry::enquired_listings));

    let account_routes = Router::new()
        .route("/login", post(account::login))
        .route("/forgot-password", post(account::forgot_password))
        .route("/reset-password", post(account::reset_password))
        .route("/current-user", get(account::current_user))
        .route("/change-password", put(account::change_password))
        .route("/update-username", put(account::update_username))
        .route("/update-profile", put(account::update_profile));

    Router::new()
        .merge(listing_routes)
        .merge(member_routes)
        .merge(account_routes)
        .route_layer(middleware::from_fn(metrics::track_http_metrics))
}
