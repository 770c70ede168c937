//! Database operations for the `scheduled_posts` table (post × account
//! publish targets with per-target outcomes).

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `scheduled_posts` table, joined with the target account's
/// platform and the owning brand's aggregator profile for publishing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledPostRow {
    pub id: i64,
    pub post_id: i64,
    pub social_account_id: i64,
    pub publish_at: DateTime<Utc>,
    pub status: String,
    pub error: Option<String>,
    pub external_post_id: Option<String>,
    pub platform: String,
    pub aggregator_account_id: String,
    pub aggregator_profile_id: Option<String>,
}

const TARGET_SELECT: &str = "SELECT sp.id, sp.post_id, sp.social_account_id, sp.publish_at, \
                sp.status, sp.error, sp.external_post_id, \
                sa.platform, sa.aggregator_account_id, b.aggregator_profile_id \
         FROM scheduled_posts sp \
         JOIN social_accounts sa ON sa.id = sp.social_account_id \
         JOIN brands b ON b.id = sa.brand_id";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Creates a pending publish target for a post × account pair.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including the unique
/// constraint on `(post_id, social_account_id)`).
pub async fn create_scheduled_post(
    pool: &PgPool,
    post_id: i64,
    social_account_id: i64,
    publish_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO scheduled_posts (post_id, social_account_id, publish_at) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(post_id)
    .bind(social_account_id)
    .bind(publish_at)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Lists pending targets whose `publish_at` has passed, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_scheduled_posts(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<ScheduledPostRow>, DbError> {
    let rows = sqlx::query_as::<_, ScheduledPostRow>(&format!(
        "{TARGET_SELECT} \
         WHERE sp.status = 'pending' AND sp.publish_at <= $1 \
         ORDER BY sp.publish_at, sp.id \
         LIMIT $2"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Lists all targets for one post.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_targets_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<ScheduledPostRow>, DbError> {
    let rows = sqlx::query_as::<_, ScheduledPostRow>(&format!(
        "{TARGET_SELECT} \
         WHERE sp.post_id = $1 \
         ORDER BY sp.id"
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Marks a target as sent, recording the platform-side post id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn mark_target_sent(
    pool: &PgPool,
    scheduled_post_id: i64,
    external_post_id: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE scheduled_posts \
         SET status = 'sent', external_post_id = $1, error = NULL, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(external_post_id)
    .bind(scheduled_post_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks a target as failed with the upstream error text.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn mark_target_failed(
    pool: &PgPool,
    scheduled_post_id: i64,
    error: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE scheduled_posts \
         SET status = 'failed', error = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(error)
    .bind(scheduled_post_id)
    .execute(pool)
    .await?;
    Ok(())
}
