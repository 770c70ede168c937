//! Database operations for the `post_analytics` table.
//!
//! Rows are append-only snapshots; aggregation into "current" counters
//! happens in `postdeck_core::engagement`, never in SQL sums.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `post_analytics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalyticsSnapshotRow {
    pub id: i64,
    pub post_id: i64,
    pub platform: String,
    pub captured_at: DateTime<Utc>,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub impressions: i64,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsSnapshotRow {
    /// Converts the row into the core aggregation input type.
    #[must_use]
    pub fn into_snapshot(self) -> postdeck_core::EngagementSnapshot {
        postdeck_core::EngagementSnapshot {
            platform: self.platform,
            captured_at: self.captured_at,
            counters: postdeck_core::EngagementCounters {
                likes: self.likes,
                comments: self.comments,
                shares: self.shares,
                impressions: self.impressions,
            },
        }
    }
}

const SNAPSHOT_COLUMNS: &str =
    "id, post_id, platform, captured_at, likes, comments, shares, impressions, created_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Appends one engagement snapshot for a post/platform pair.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_analytics_snapshot(
    pool: &PgPool,
    post_id: i64,
    platform: &str,
    captured_at: DateTime<Utc>,
    likes: i64,
    comments: i64,
    shares: i64,
    impressions: i64,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO post_analytics \
             (post_id, platform, captured_at, likes, comments, shares, impressions) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(post_id)
    .bind(platform)
    .bind(captured_at)
    .bind(likes)
    .bind(comments)
    .bind(shares)
    .bind(impressions)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Returns every snapshot row for one post.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_snapshots_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<AnalyticsSnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, AnalyticsSnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM post_analytics \
         WHERE post_id = $1 \
         ORDER BY platform, captured_at, id"
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns snapshot rows for every post of a brand, optionally bounded by a
/// `[from, to]` captured-at range.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_snapshots_for_brand(
    pool: &PgPool,
    brand_id: i64,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<AnalyticsSnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, AnalyticsSnapshotRow>(
        "SELECT pa.id, pa.post_id, pa.platform, pa.captured_at, pa.likes, pa.comments, \
                pa.shares, pa.impressions, pa.created_at \
         FROM post_analytics pa \
         JOIN posts p ON p.id = pa.post_id \
         WHERE p.brand_id = $1 \
           AND ($2::TIMESTAMPTZ IS NULL OR pa.captured_at >= $2) \
           AND ($3::TIMESTAMPTZ IS NULL OR pa.captured_at <= $3) \
         ORDER BY pa.captured_at, pa.id",
    )
    .bind(brand_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
