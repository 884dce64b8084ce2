use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{ListingFilter, ListingPatch, NewListing};
use crate::error::ApiError;

const LISTING_COLUMNS: &str = "id, title, price, location, rooms, bathrooms, nearby, image_key, \
     description, contact_email, contact_number, property_type, owner_id, created_at";

/// Listing row; serialized as-is in API responses.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub price: i64,
    pub location: String,
    pub rooms: i32,
    pub bathrooms: i32,
    pub nearby: String,
    pub image_key: String,
    pub description: String,
    pub contact_email: String,
    pub contact_number: String,
    pub property_type: String,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Listing {
    /// Insert with a caller-generated id (the id also namespaces the image
    /// key in blob storage). A missing owner surfaces as `OwnerNotFound`
    /// from the foreign key.
    pub async fn insert(
        db: &PgPool,
        id: Uuid,
        new: &NewListing,
        image_key: &str,
    ) -> Result<Listing, ApiError> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            INSERT INTO listings
                (id, title, price, location, rooms, bathrooms, nearby, image_key,
                 description, contact_email, contact_number, property_type, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&new.title)
        .bind(new.price)
        .bind(&new.location)
        .bind(new.rooms)
        .bind(new.bathrooms)
        .bind(&new.nearby)
        .bind(image_key)
        .bind(&new.description)
        .bind(&new.contact_email)
        .bind(&new.contact_number)
        .bind(new.property_type.as_str())
        .bind(new.owner_id)
        .fetch_one(db)
        .await?;
        Ok(listing)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Listing>, ApiError> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(listing)
    }

    pub async fn search(db: &PgPool, filter: &ListingFilter) -> Result<Vec<Listing>, ApiError> {
        let mut qb = build_select(filter);
        let rows = qb.build_query_as::<Listing>().fetch_all(db).await?;
        Ok(rows)
    }

    /// Apply a non-empty patch. Returns `None` when no row has this id.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        patch: &ListingPatch,
        image_key: Option<&str>,
    ) -> Result<Option<Listing>, ApiError> {
        let mut qb = build_update(id, patch, image_key);
        let row = qb.build_query_as::<Listing>().fetch_optional(db).await?;
        Ok(row)
    }

    /// Remove the row, handing back its image key so the blob can be
    /// cleaned up. `None` when no row has this id.
    pub async fn delete(db: &PgPool, id: Uuid) -> Result<Option<String>, ApiError> {
        let row: Option<(String,)> =
            sqlx::query_as("DELETE FROM listings WHERE id = $1 RETURNING image_key")
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(row.map(|r| r.0))
    }
}

/// Results come back in creation order so repeated queries are stable.
fn build_select(filter: &ListingFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {LISTING_COLUMNS} FROM listings WHERE TRUE"
    ));
    if let Some(rooms) = filter.rooms {
        qb.push(" AND rooms >= ").push_bind(rooms);
    }
    if let Some(bathrooms) = filter.bathrooms {
        qb.push(" AND bathrooms >= ").push_bind(bathrooms);
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND price <= ").push_bind(max_price);
    }
    if let Some(location) = &filter.location {
        qb.push(" AND location ILIKE ")
            .push_bind(contains_pattern(location));
    }
    if let Some(nearby) = &filter.nearby {
        qb.push(" AND nearby ILIKE ")
            .push_bind(contains_pattern(nearby));
    }
    if let Some(property_type) = filter.property_type {
        qb.push(" AND property_type = ")
            .push_bind(property_type.as_str());
    }
    qb.push(" ORDER BY created_at ASC, id ASC");
    qb
}

fn build_update(
    id: Uuid,
    patch: &ListingPatch,
    image_key: Option<&str>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE listings SET ");
    {
        let mut sets = qb.separated(", ");
        if let Some(v) = &patch.title {
            sets.push("title = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.price {
            sets.push("price = ").push_bind_unseparated(v);
        }
        if let Some(v) = &patch.location {
            sets.push("location = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.rooms {
            sets.push("rooms = ").push_bind_unseparated(v);
        }
        if let Some(v) = patch.bathrooms {
            sets.push("bathrooms = ").push_bind_unseparated(v);
        }
        if let Some(v) = &patch.nearby {
            sets.push("nearby = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.description {
            sets.push("description = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.contact_email {
            sets.push("contact_email = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.contact_number {
            sets.push("contact_number = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.property_type {
            sets.push("property_type = ").push_bind_unseparated(v.as_str());
        }
        if let Some(k) = image_key {
            sets.push("image_key = ").push_bind_unseparated(k.to_string());
        }
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(format!(" RETURNING {LISTING_COLUMNS}"));
    qb
}

/// `%needle%` with LIKE metacharacters in the needle escaped, so user input
/// only ever matches as a literal substring.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::dto::PropertyType;

    #[test]
    fn empty_filter_selects_everything_in_creation_order() {
        let sql = build_select(&ListingFilter::default()).into_sql();
        assert!(!sql.contains(" AND "));
        assert!(sql.ends_with("ORDER BY created_at ASC, id ASC"));
    }

    #[test]
    fn each_filter_contributes_its_predicate() {
        let filter = ListingFilter {
            rooms: Some(3),
            bathrooms: Some(2),
            max_price: Some(300_000),
            location: Some("valencia".into()),
            nearby: Some("beach".into()),
            property_type: Some(PropertyType::Villa),
        };
        let sql = build_select(&filter).into_sql();
        assert!(sql.contains("rooms >= $1"));
        assert!(sql.contains("bathrooms >= $2"));
        assert!(sql.contains("price <= $3"));
        assert!(sql.contains("location ILIKE $4"));
        assert!(sql.contains("nearby ILIKE $5"));
        assert!(sql.contains("property_type = $6"));
    }

    #[test]
    fn filters_combine_with_and() {
        let filter = ListingFilter {
            rooms: Some(3),
            property_type: Some(PropertyType::Villa),
            ..Default::default()
        };
        let sql = build_select(&filter).into_sql();
        assert!(sql.contains("rooms >= $1 AND property_type = $2"));
    }

    #[test]
    fn substring_patterns_escape_like_metacharacters() {
        assert_eq!(contains_pattern("beach"), "%beach%");
        assert_eq!(contains_pattern("50%"), "%50\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("c\\d"), "%c\\\\d%");
    }

    #[test]
    fn update_sets_only_the_provided_fields() {
        let patch = ListingPatch {
            price: Some(500_000),
            ..Default::default()
        };
        let sql = build_update(Uuid::nil(), &patch, None).into_sql();
        assert!(sql.contains("price = $1"));
        assert!(sql.contains("WHERE id = $2"));
        assert!(!sql.contains("title = "));
        assert!(!sql.contains("image_key = "));
    }

    #[test]
    fn update_without_new_image_never_touches_the_image_key() {
        let patch = ListingPatch {
            title: Some("New title".into()),
            description: Some("New text".into()),
            ..Default::default()
        };
        let sql = build_update(Uuid::nil(), &patch, None).into_sql();
        assert!(sql.contains("title = $1, description = $2"));
        assert!(!sql.contains("image_key = "));
    }

    #[test]
    fn update_with_new_image_replaces_the_key() {
        let patch = ListingPatch::default();
        let sql = build_update(Uuid::nil(), &patch, Some("listings/x/y.jpg")).into_sql();
        assert!(sql.contains("image_key = $1"));
    }
}
