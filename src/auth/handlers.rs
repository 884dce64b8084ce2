use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
            ResetPasswordRequest, UpdateUserRequest, UserView,
        },
        password::{hash_password, verify_password},
        repo::User,
        token::{generate_reset_token, token_expiry},
    },
    error::ApiError,
    mail::reset_link,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", post(reset_password))
        .route("/users/:email", patch(update_user))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation("Password too short"));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let email = payload.email.trim();
    if !is_valid_email(email) {
        warn!(email = %email, "register with invalid email");
        return Err(ApiError::validation("Invalid email"));
    }
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    check_password(&payload.password)?;

    let hash = hash_password(&payload.password)?;
    // Uniqueness is the unique index's job; a concurrent duplicate comes back
    // as AlreadyExists from the insert itself.
    let user = User::create(&state.db, email, username, &hash).await?;

    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<UserView>, ApiError> {
    let user = User::find_by_email(&state.db, payload.email.trim())
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_email(&state.db, payload.email.trim())
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let token = generate_reset_token();
    let expiry = token_expiry(state.config.reset_token_ttl_minutes);
    User::set_reset_token(&state.db, user.id, &token, expiry).await?;

    // The token stays persisted even when delivery fails; the caller can
    // retry the request and a fresh token will overwrite this one.
    let link = reset_link(&state.config.public_base_url, &token);
    state
        .mailer
        .send_reset_link(&user.email, &link)
        .await
        .map_err(ApiError::Delivery)?;

    info!(user_id = %user.id, "password reset link sent");
    Ok(Json(MessageResponse {
        message: "Password reset link sent to email",
    }))
}

#[instrument(skip(state, payload, token))]
async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    check_password(&payload.password)?;
    let hash = hash_password(&payload.password)?;

    let user = User::consume_reset_token(&state.db, &token, &hash)
        .await?
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    info!(user_id = %user.id, "password reset consumed");
    Ok(Json(MessageResponse {
        message: "Password reset successfully",
    }))
}

#[instrument(skip(state, payload))]
async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserView>, ApiError> {
    let user = User::find_by_email(&state.db, email.trim())
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    // Empty strings count as absent, matching the partial-update contract.
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let new_email = payload
        .new_email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    if let Some(e) = new_email.as_deref() {
        if !is_valid_email(e) {
            return Err(ApiError::validation("Invalid email"));
        }
    }

    let new_hash = match payload.password.as_deref().filter(|p| !p.is_empty()) {
        Some(p) => {
            check_password(p)?;
            Some(hash_password(p)?)
        }
        None => None,
    };

    let updated = User::update_details(
        &state.db,
        user.id,
        username,
        new_email.as_deref(),
        new_hash.as_deref(),
    )
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    info!(user_id = %updated.id, "user details updated");
    Ok(Json(updated.into()))
}
