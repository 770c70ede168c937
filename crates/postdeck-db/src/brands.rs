//! Database operations for the `brands` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `brands` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub aggregator_profile_id: Option<String>,
    pub timezone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

const BRAND_COLUMNS: &str = "id, public_id, user_id, name, slug, aggregator_profile_id, \
                             timezone, is_active, created_at, updated_at, deleted_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns all of a user's active, non-deleted brands, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_brands(pool: &PgPool, user_id: i64) -> Result<Vec<BrandRow>, DbError> {
    let rows = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands \
         WHERE user_id = $1 AND is_active = true AND deleted_at IS NULL \
         ORDER BY name"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a user's active, non-deleted brand by slug, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand_by_slug(
    pool: &PgPool,
    user_id: i64,
    slug: &str,
) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands \
         WHERE user_id = $1 AND slug = $2 AND is_active = true AND deleted_at IS NULL"
    ))
    .bind(user_id)
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns an active, non-deleted brand by public id, unscoped. For the
/// OAuth callback, which arrives without a session.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands \
         WHERE public_id = $1 AND is_active = true AND deleted_at IS NULL"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every active, non-deleted brand across all users. For batch jobs
/// (account resync) that walk the whole tenant set.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_all_active_brands(pool: &PgPool) -> Result<Vec<BrandRow>, DbError> {
    let rows = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands \
         WHERE is_active = true AND deleted_at IS NULL \
         ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Counts a user's active, non-deleted brands (plan-limit usage).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_active_brands(pool: &PgPool, user_id: i64) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM brands \
         WHERE user_id = $1 AND is_active = true AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Creates a new brand row and returns the full inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails (including unique constraint
/// violations on `(user_id, slug)`).
pub async fn create_brand(
    pool: &PgPool,
    user_id: i64,
    name: &str,
    slug: &str,
    timezone: Option<&str>,
) -> Result<BrandRow, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "INSERT INTO brands (user_id, name, slug, timezone, is_active) \
         VALUES ($1, $2, $3, $4, true) \
         RETURNING {BRAND_COLUMNS}"
    ))
    .bind(user_id)
    .bind(name)
    .bind(slug)
    .bind(timezone)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Stores the aggregator profile id created for a brand.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn set_brand_profile_id(
    pool: &PgPool,
    brand_id: i64,
    profile_id: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE brands \
         SET aggregator_profile_id = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(profile_id)
    .bind(brand_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Updates brand metadata. `Some(v)` sets the value, `None` preserves the
/// existing one; done in a single `UPDATE … RETURNING` to avoid a
/// SELECT + UPDATE race.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_brand(
    pool: &PgPool,
    brand_id: i64,
    name: Option<&str>,
    timezone: Option<Option<&str>>,
) -> Result<BrandRow, DbError> {
    // For the nullable column (Option<Option<&str>>) we distinguish:
    //   None        => keep existing value
    //   Some(None)  => set to NULL
    //   Some(value) => set to value
    let timezone_supplied = timezone.is_some();
    let timezone_val = timezone.flatten();

    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "UPDATE brands \
         SET name       = COALESCE($2, name), \
             timezone   = CASE WHEN $3::BOOL THEN $4 ELSE timezone END, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {BRAND_COLUMNS}"
    ))
    .bind(brand_id)
    .bind(name)
    .bind(timezone_supplied)
    .bind(timezone_val)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Soft-deletes a brand by setting `is_active = false` and `deleted_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn deactivate_brand(pool: &PgPool, brand_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE brands \
         SET is_active = false, deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(brand_id)
    .execute(pool)
    .await?;
    Ok(())
}
