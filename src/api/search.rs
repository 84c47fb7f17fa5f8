//! Search endpoint

use axum::{extract::State, response::Json};

use super::extract::ApiJson;
use crate::AppState;
use crate::error::AppError;
use crate::service::{SearchFilters, SearchResults, SearchService};

/// POST /api/search-ads
///
/// The body is a filter object; every key except `address` is optional.
pub async fn search_listings(
    State(state): State<AppState>,
    ApiJson(filters): ApiJson<SearchFilters>,
) -> Result<Json<SearchResults>, AppError> {
    let results = build_search_service(&state).search(filters).await?;
    Ok(Json(results))
}

fn build_search_service(state: &AppState) -> SearchService {
    SearchService::new(
        state.db.clone(),
        state.geocoder.clone(),
        state.config.search.default_radius_km,
    )
}
