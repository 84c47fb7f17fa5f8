//! Account endpoints
//!
//! Login (with sign-up on first login), password reset and profile edits.

use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::extract::{ApiJson, MultipartForm};
use super::listings::OkResponse;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::User;
use crate::error::AppError;
use crate::service::{AccountService, LoginResponse, ProfileForm};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUsernameRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = build_account_service(&state)
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(response))
}

/// POST /api/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = build_account_service(&state)
        .forgot_password(&request.email)
        .await?;
    Ok(Json(MessageResponse { message }))
}

/// POST /api/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    build_account_service(&state)
        .reset_password(&request.token, &request.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been successfully reset. Please login with your new password",
    }))
}

/// GET /api/current-user
pub async fn current_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = build_account_service(&state)
        .current_user(&session.user_id)
        .await?;
    Ok(Json(UserResponse { user }))
}

/// PUT /api/change-password
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<OkResponse>, AppError> {
    build_account_service(&state)
        .change_password(
            &session.user_id,
            &request.old_password,
            &request.new_password,
        )
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

/// PUT /api/update-username
///
/// Responds with the bare user record.
pub async fn update_username(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    ApiJson(request): ApiJson<UpdateUsernameRequest>,
) -> Result<Json<User>, AppError> {
    let user = build_account_service(&state)
        .update_username(&session.user_id, &request.username)
        .await?;
    Ok(Json(user))
}

/// PUT /api/update-profile
///
/// Multipart body with optional text parts `name`, `phone`, `company`,
/// `address`, `about` and optional image parts `photo`, `logo`.
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    multipart: Multipart,
) -> Result<Json<UserResponse>, AppError> {
    let form = profile_from_form(MultipartForm::read(multipart).await?);
    let user = build_account_service(&state)
        .update_profile(&session.user_id, form)
        .await?;
    Ok(Json(UserResponse { user }))
}

fn profile_from_form(mut form: MultipartForm) -> ProfileForm {
    let text = |name: &str| form.text(name).map(str::to_string);
    let mut profile = ProfileForm {
        name: text("name"),
        phone: text("phone"),
        company: text("company"),
        address: text("address"),
        about: text("about"),
        ..Default::default()
    };
    profile.photo = form.take_file("photo");
    profile.logo = form.take_file("logo");
    profile
}

fn build_account_service(state: &AppState) -> AccountService {
    AccountService::new(
        state.db.clone(),
        state.notifier.clone(),
        state.images.clone(),
        state.config.clone(),
    )
}
