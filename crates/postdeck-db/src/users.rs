//! Database operations for `users`, `sessions`, and `user_settings`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub public_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user behind a valid session token, joined through `sessions`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionUserRow {
    pub user_id: i64,
    pub public_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// A row from the `user_settings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSettingsRow {
    pub user_id: i64,
    pub timezone: String,
    pub locale: String,
    pub default_hashtags: Value,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Creates a user and returns the full inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including unique email
/// violations).
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    display_name: Option<&str>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (email, display_name) \
         VALUES ($1, $2) \
         RETURNING id, public_id, email, display_name, created_at, updated_at",
    )
    .bind(email)
    .bind(display_name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns a user by internal id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_id(pool: &PgPool, user_id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, public_id, email, display_name, created_at, updated_at \
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns a user by public id, or `None` if not found. Used by billing
/// webhooks, which identify the user by the id embedded in checkout metadata.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, public_id, email, display_name, created_at, updated_at \
         FROM users WHERE public_id = $1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Creates a session row for a user with the given token and TTL.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_session(
    pool: &PgPool,
    user_id: i64,
    token: &str,
    ttl_hours: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sessions (user_id, token, expires_at) \
         VALUES ($1, $2, NOW() + make_interval(hours => $3::int))",
    )
    .bind(user_id)
    .bind(token)
    .bind(ttl_hours)
    .execute(pool)
    .await?;
    Ok(())
}

/// Resolves a session token to its user, returning `None` for unknown or
/// expired tokens.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_user_by_session_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<SessionUserRow>, DbError> {
    let row = sqlx::query_as::<_, SessionUserRow>(
        "SELECT u.id AS user_id, u.public_id, u.email, s.expires_at \
         FROM sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token = $1 AND s.expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns the user's settings row, inserting defaults on first read.
///
/// `default_timezone` is only used when the row does not exist yet.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_or_create_settings(
    pool: &PgPool,
    user_id: i64,
    default_timezone: &str,
) -> Result<UserSettingsRow, DbError> {
    let row = sqlx::query_as::<_, UserSettingsRow>(
        "INSERT INTO user_settings (user_id, timezone) \
         VALUES ($1, $2) \
         ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
         RETURNING user_id, timezone, locale, default_hashtags, updated_at",
    )
    .bind(user_id)
    .bind(default_timezone)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Sparse settings update: `Some(v)` sets a field, `None` keeps the current
/// value.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no settings row exists, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn update_settings(
    pool: &PgPool,
    user_id: i64,
    timezone: Option<&str>,
    locale: Option<&str>,
    default_hashtags: Option<&Value>,
) -> Result<UserSettingsRow, DbError> {
    let row = sqlx::query_as::<_, UserSettingsRow>(
        "UPDATE user_settings \
         SET timezone         = COALESCE($2, timezone), \
             locale           = COALESCE($3, locale), \
             default_hashtags = COALESCE($4, default_hashtags), \
             updated_at       = NOW() \
         WHERE user_id = $1 \
         RETURNING user_id, timezone, locale, default_hashtags, updated_at",
    )
    .bind(user_id)
    .bind(timezone)
    .bind(locale)
    .bind(default_hashtags)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;
    Ok(row)
}
