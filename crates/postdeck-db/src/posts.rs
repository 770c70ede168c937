//! Database operations for the `posts` table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `posts` table.
///
/// `image_urls` and `platforms` are JSONB arrays of strings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub public_id: Uuid,
    pub brand_id: i64,
    pub body: String,
    pub ai_caption: Option<String>,
    pub image_urls: Value,
    pub platforms: Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const POST_COLUMNS: &str =
    "id, public_id, brand_id, body, ai_caption, image_urls, platforms, status, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Creates a post in `draft` status and returns the full inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_post(
    pool: &PgPool,
    brand_id: i64,
    body: &str,
    ai_caption: Option<&str>,
    image_urls: &Value,
    platforms: &Value,
) -> Result<PostRow, DbError> {
    let row = sqlx::query_as::<_, PostRow>(&format!(
        "INSERT INTO posts (brand_id, body, ai_caption, image_urls, platforms, status) \
         VALUES ($1, $2, $3, $4, $5, 'draft') \
         RETURNING {POST_COLUMNS}"
    ))
    .bind(brand_id)
    .bind(body)
    .bind(ai_caption)
    .bind(image_urls)
    .bind(platforms)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns a post by public id, scoped to the owning user through its brand.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_post_by_public_id(
    pool: &PgPool,
    user_id: i64,
    public_id: Uuid,
) -> Result<Option<PostRow>, DbError> {
    let row = sqlx::query_as::<_, PostRow>(
        "SELECT p.id, p.public_id, p.brand_id, p.body, p.ai_caption, p.image_urls, \
                p.platforms, p.status, p.created_at, p.updated_at \
         FROM posts p \
         JOIN brands b ON b.id = p.brand_id \
         WHERE p.public_id = $1 AND b.user_id = $2 AND b.deleted_at IS NULL",
    )
    .bind(public_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns a post by internal id, unscoped. For background jobs that operate
/// across all users; handlers go through [`get_post_by_public_id`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_post_by_id(pool: &PgPool, post_id: i64) -> Result<Option<PostRow>, DbError> {
    let row = sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
    ))
    .bind(post_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Lists a user's posts, newest first, optionally filtered by brand.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_posts_for_user(
    pool: &PgPool,
    user_id: i64,
    brand_id: Option<i64>,
    limit: i64,
) -> Result<Vec<PostRow>, DbError> {
    let rows = match brand_id {
        Some(brand_id) => {
            sqlx::query_as::<_, PostRow>(
                "SELECT p.id, p.public_id, p.brand_id, p.body, p.ai_caption, p.image_urls, \
                        p.platforms, p.status, p.created_at, p.updated_at \
                 FROM posts p \
                 JOIN brands b ON b.id = p.brand_id \
                 WHERE b.user_id = $1 AND p.brand_id = $2 AND b.deleted_at IS NULL \
                 ORDER BY p.created_at DESC, p.id DESC \
                 LIMIT $3",
            )
            .bind(user_id)
            .bind(brand_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, PostRow>(
                "SELECT p.id, p.public_id, p.brand_id, p.body, p.ai_caption, p.image_urls, \
                        p.platforms, p.status, p.created_at, p.updated_at \
                 FROM posts p \
                 JOIN brands b ON b.id = p.brand_id \
                 WHERE b.user_id = $1 AND b.deleted_at IS NULL \
                 ORDER BY p.created_at DESC, p.id DESC \
                 LIMIT $2",
            )
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Counts a user's posts created at or after `since` (plan-limit usage).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_posts_created_since(
    pool: &PgPool,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM posts p \
         JOIN brands b ON b.id = p.brand_id \
         WHERE b.user_id = $1 AND p.created_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Sparse post update: `Some(v)` sets a field, `None` keeps the current value.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_post(
    pool: &PgPool,
    post_id: i64,
    body: Option<&str>,
    ai_caption: Option<Option<&str>>,
    image_urls: Option<&Value>,
    platforms: Option<&Value>,
) -> Result<PostRow, DbError> {
    let ai_caption_supplied = ai_caption.is_some();
    let ai_caption_val = ai_caption.flatten();

    let row = sqlx::query_as::<_, PostRow>(&format!(
        "UPDATE posts \
         SET body       = COALESCE($2, body), \
             ai_caption = CASE WHEN $3::BOOL THEN $4 ELSE ai_caption END, \
             image_urls = COALESCE($5, image_urls), \
             platforms  = COALESCE($6, platforms), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {POST_COLUMNS}"
    ))
    .bind(post_id)
    .bind(body)
    .bind(ai_caption_supplied)
    .bind(ai_caption_val)
    .bind(image_urls)
    .bind(platforms)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Sets the lifecycle status of a post.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn set_post_status(pool: &PgPool, post_id: i64, status: &str) -> Result<(), DbError> {
    sqlx::query("UPDATE posts SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status)
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Hard-deletes a post; scheduling rows and analytics cascade.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_post(pool: &PgPool, post_id: i64) -> Result<(), DbError> {
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(())
}
