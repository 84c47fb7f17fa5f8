//! Enquiry endpoints

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;

use super::extract::{ApiJson, page_number};
use super::listings::OkResponse;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{EnquiryService, ListingPage};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[serde(default)]
    pub ad_id: String,
    #[serde(default)]
    pub message: String,
}

/// POST /api/contact-agent
pub async fn contact_agent(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    ApiJson(request): ApiJson<ContactRequest>,
) -> Result<Json<OkResponse>, AppError> {
    build_enquiry_service(&state)
        .contact_agent(&session.user_id, &request.ad_id, &request.message)
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

/// GET /api/enquired-ads/:page
pub async fn enquired_listings(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(page): Path<String>,
) -> Result<Json<ListingPage>, AppError> {
    let listings = build_enquiry_service(&state)
        .list(&session.user_id, page_number(&page))
        .await?;
    Ok(Json(listings))
}

fn build_enquiry_service(state: &AppState) -> EnquiryService {
    EnquiryService::new(state.db.clone(), state.notifier.clone())
}
