//! Database operations for the `social_accounts` table.
//!
//! Rows are reconciled against the aggregator's account list by
//! [`upsert_social_account`], keyed on `(brand_id, aggregator_account_id)`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `social_accounts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SocialAccountRow {
    pub id: i64,
    pub brand_id: i64,
    pub platform: String,
    pub aggregator_account_id: String,
    pub display_name: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub metadata: Value,
    pub manually_disconnected: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const ACCOUNT_COLUMNS: &str = "id, brand_id, platform, aggregator_account_id, display_name, \
                               access_token, refresh_token, metadata, manually_disconnected, \
                               last_synced_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns all accounts for a brand, connected first, then by platform.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_accounts_for_brand(
    pool: &PgPool,
    brand_id: i64,
) -> Result<Vec<SocialAccountRow>, DbError> {
    let rows = sqlx::query_as::<_, SocialAccountRow>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM social_accounts \
         WHERE brand_id = $1 \
         ORDER BY manually_disconnected, platform, id"
    ))
    .bind(brand_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns one account by id, scoped to a brand.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_account_for_brand(
    pool: &PgPool,
    brand_id: i64,
    account_id: i64,
) -> Result<Option<SocialAccountRow>, DbError> {
    let row = sqlx::query_as::<_, SocialAccountRow>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM social_accounts \
         WHERE brand_id = $1 AND id = $2"
    ))
    .bind(brand_id)
    .bind(account_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Counts connected (not manually disconnected) accounts across all of a
/// user's active brands (plan-limit usage).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_connected_accounts(pool: &PgPool, user_id: i64) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM social_accounts sa \
         JOIN brands b ON b.id = sa.brand_id \
         WHERE b.user_id = $1 AND b.deleted_at IS NULL \
           AND sa.manually_disconnected = false",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Upserts one account from the aggregator's list, keyed on
/// `(brand_id, aggregator_account_id)`.
///
/// On conflict the platform, display name, and metadata are refreshed and
/// `last_synced_at` is bumped. The locally-set `manually_disconnected` flag
/// is preserved unless `fresh_reconnect` is true, in which case it is cleared
/// (the user just completed the OAuth flow for this brand).
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_social_account(
    pool: &PgPool,
    brand_id: i64,
    platform: &str,
    aggregator_account_id: &str,
    display_name: Option<&str>,
    metadata: &Value,
    fresh_reconnect: bool,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO social_accounts \
             (brand_id, platform, aggregator_account_id, display_name, metadata, last_synced_at) \
         VALUES ($1, $2, $3, $4, $5, NOW()) \
         ON CONFLICT (brand_id, aggregator_account_id) DO UPDATE SET \
             platform              = EXCLUDED.platform, \
             display_name          = EXCLUDED.display_name, \
             metadata              = EXCLUDED.metadata, \
             manually_disconnected = CASE WHEN $6::BOOL THEN false \
                                          ELSE social_accounts.manually_disconnected END, \
             last_synced_at        = NOW(), \
             updated_at            = NOW() \
         RETURNING id",
    )
    .bind(brand_id)
    .bind(platform)
    .bind(aggregator_account_id)
    .bind(display_name)
    .bind(metadata)
    .bind(fresh_reconnect)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Sets or clears the `manually_disconnected` flag on one account.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn set_manually_disconnected(
    pool: &PgPool,
    account_id: i64,
    disconnected: bool,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE social_accounts \
         SET manually_disconnected = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(disconnected)
    .bind(account_id)
    .execute(pool)
    .await?;
    Ok(())
}
