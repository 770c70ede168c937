//! Database operations for the `ai_usage` table (per-generation accounting
//! used by plan-limit checks).

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Records one AI generation of the given kind (`caption` or `sentiment`).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_ai_usage(
    pool: &PgPool,
    user_id: i64,
    brand_id: Option<i64>,
    kind: &str,
) -> Result<(), DbError> {
    sqlx::query("INSERT INTO ai_usage (user_id, brand_id, kind) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(brand_id)
        .bind(kind)
        .execute(pool)
        .await?;
    Ok(())
}

/// Counts a user's AI generations at or after `since` (plan-limit usage).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_ai_usage_since(
    pool: &PgPool,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ai_usage WHERE user_id = $1 AND created_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
