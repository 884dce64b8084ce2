use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreateListingForm, ListingFilter, UpdateListingForm};
use super::repo::Listing;
use super::services::{self, ImageUpload};
use crate::{auth::dto::MessageResponse, error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/properties",
            get(list_listings).post(create_listing),
        )
        .route(
            "/properties/:id",
            axum::routing::patch(update_listing).delete(delete_listing),
        )
        .route("/properties/:id/image", get(get_listing_image))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
async fn list_listings(
    State(state): State<AppState>,
    Query(filter): Query<ListingFilter>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let listings = Listing::search(&state.db, &filter).await?;
    Ok(Json(listings))
}

#[instrument(skip(state, mp))]
async fn create_listing(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    let (fields, image) = read_multipart(mp).await?;
    let new = CreateListingForm::from_fields(fields).finish()?;
    let image = image.ok_or_else(|| ApiError::validation("image is required"))?;

    let listing = services::create_listing(&state, new, image).await?;
    info!(listing_id = %listing.id, owner_id = %listing.owner_id, "listing created");
    Ok((StatusCode::CREATED, Json(listing)))
}

#[instrument(skip(state, mp))]
async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<Listing>, ApiError> {
    let (fields, image) = read_multipart(mp).await?;
    let patch = UpdateListingForm::from_fields(fields).finish()?;

    let listing = services::update_listing(&state, id, patch, image).await?;
    info!(listing_id = %listing.id, "listing updated");
    Ok(Json(listing))
}

#[instrument(skip(state))]
async fn delete_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::delete_listing(&state, id).await?;
    info!(listing_id = %id, "listing deleted");
    Ok(Json(MessageResponse {
        message: "Property deleted successfully",
    }))
}

#[instrument(skip(state))]
async fn get_listing_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let url = services::presign_listing_image(&state, id).await?;
    Ok(Redirect::temporary(&url))
}

/// Split a multipart body into its text fields and the optional `image`
/// part. Unknown parts are dropped.
async fn read_multipart(
    mut mp: Multipart,
) -> Result<(Vec<(String, String)>, Option<ImageUpload>), ApiError> {
    let mut fields = Vec::new();
    let mut image = None;
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "image" {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = field.bytes().await.map_err(bad_multipart)?;
            image = Some(ImageUpload { body, content_type });
        } else {
            let value = field.text().await.map_err(bad_multipart)?;
            fields.push((name, value));
        }
    }
    Ok((fields, image))
}

fn bad_multipart(e: MultipartError) -> ApiError {
    warn!(error = %e, "malformed multipart body");
    ApiError::validation("Malformed multipart body")
}
