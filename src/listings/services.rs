use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use super::dto::{ListingPatch, NewListing};
use super::repo::Listing;
use crate::error::ApiError;
use crate::state::AppState;

/// One uploaded image part.
pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

/// Upload the image first, then persist the row pointing at it. Keys are
/// namespaced by listing id: `listings/<listing>/<object>.<ext>`.
pub async fn create_listing(
    st: &AppState,
    new: NewListing,
    image: ImageUpload,
) -> Result<Listing, ApiError> {
    let id = Uuid::new_v4();
    let key = upload_image(st, id, &image).await?;
    Listing::insert(&st.db, id, &new, &key).await
}

/// Partial update. A new image replaces the stored key; no image means the
/// key is left exactly as it was.
pub async fn update_listing(
    st: &AppState,
    id: Uuid,
    patch: ListingPatch,
    image: Option<ImageUpload>,
) -> Result<Listing, ApiError> {
    if patch.is_empty() && image.is_none() {
        return Listing::find_by_id(&st.db, id)
            .await?
            .ok_or(ApiError::NotFound("Property"));
    }

    let new_key = match image {
        Some(img) => Some(upload_image(st, id, &img).await?),
        None => None,
    };

    Listing::update(&st.db, id, &patch, new_key.as_deref())
        .await?
        .ok_or(ApiError::NotFound("Property"))
}

pub async fn delete_listing(st: &AppState, id: Uuid) -> Result<(), ApiError> {
    let image_key = Listing::delete(&st.db, id)
        .await?
        .ok_or(ApiError::NotFound("Property"))?;

    // Best effort; an orphaned blob is not worth failing the request over.
    if let Err(e) = st.storage.remove(&image_key).await {
        warn!(error = %e, %image_key, "failed to delete listing image");
    }
    Ok(())
}

/// Short-lived URL for the listing's stored image.
pub async fn presign_listing_image(st: &AppState, id: Uuid) -> Result<String, ApiError> {
    const TTL_SECS: u64 = 10 * 60;
    let listing = Listing::find_by_id(&st.db, id)
        .await?
        .ok_or(ApiError::NotFound("Property"))?;
    let url = st.storage.presign(&listing.image_key, TTL_SECS).await?;
    Ok(url)
}

async fn upload_image(st: &AppState, listing_id: Uuid, image: &ImageUpload) -> Result<String, ApiError> {
    let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
    let key = format!("listings/{}/{}.{}", listing_id, Uuid::new_v4(), ext);
    st.storage
        .store(&key, image.body.clone(), &image.content_type)
        .await?;
    Ok(key)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[tokio::test]
    async fn upload_key_is_namespaced_by_listing() {
        let state = AppState::fake();
        let listing_id = Uuid::new_v4();
        let image = ImageUpload {
            body: Bytes::from_static(b"not really a jpeg"),
            content_type: "image/jpeg".into(),
        };
        let key = upload_image(&state, listing_id, &image).await.unwrap();
        assert!(key.starts_with(&format!("listings/{}/", listing_id)));
        assert!(key.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn unknown_content_type_falls_back_to_bin() {
        let state = AppState::fake();
        let image = ImageUpload {
            body: Bytes::from_static(b"bytes"),
            content_type: "application/octet-stream".into(),
        };
        let key = upload_image(&state, Uuid::new_v4(), &image).await.unwrap();
        assert!(key.ends_with(".bin"));
    }
}
