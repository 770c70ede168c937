//! Database operations for `subscription_plans`, `subscriptions`,
//! `billing_history`, `coupons`, and `marketing_events`.
//!
//! Subscription state is externally driven by payment-processor webhooks;
//! local writes only mirror what the processor reports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `subscription_plans` table. NULL caps mean unlimited.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanRow {
    pub id: i64,
    pub tier: String,
    pub name: String,
    pub monthly_price: Decimal,
    pub currency: String,
    pub max_posts_per_month: Option<i64>,
    pub max_ai_generations_per_month: Option<i64>,
    pub max_images_per_post: Option<i64>,
    pub max_brands: Option<i64>,
    pub max_social_accounts: Option<i64>,
    pub is_active: bool,
}

impl PlanRow {
    /// Converts the row's caps into the core limits type.
    #[must_use]
    pub fn limits(&self) -> postdeck_core::PlanLimits {
        postdeck_core::PlanLimits {
            max_posts_per_month: self.max_posts_per_month,
            max_ai_generations_per_month: self.max_ai_generations_per_month,
            max_images_per_post: self.max_images_per_post,
            max_brands: self.max_brands,
            max_social_accounts: self.max_social_accounts,
        }
    }
}

/// A row from the `subscriptions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub status: String,
    pub external_subscription_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `billing_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillingHistoryRow {
    pub id: i64,
    pub user_id: i64,
    pub subscription_id: Option<i64>,
    pub external_payment_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub occurred_at: DateTime<Utc>,
}

/// A row from the `coupons` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CouponRow {
    pub id: i64,
    pub code: String,
    pub percent_off: i32,
    pub max_redemptions: Option<i64>,
    pub redeemed_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CouponRow {
    /// True when the coupon can still be redeemed at `now`.
    #[must_use]
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.expires_at.is_none_or(|exp| exp > now)
            && self
                .max_redemptions
                .is_none_or(|cap| self.redeemed_count < cap)
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, status, external_subscription_id, \
     current_period_start, current_period_end, cancel_at_period_end, created_at, updated_at";

// ---------------------------------------------------------------------------
// Plan queries
// ---------------------------------------------------------------------------

/// Returns the active plan row for a tier, or `None` if not seeded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_plan_by_tier(pool: &PgPool, tier: &str) -> Result<Option<PlanRow>, DbError> {
    let row = sqlx::query_as::<_, PlanRow>(
        "SELECT id, tier, name, monthly_price, currency, max_posts_per_month, \
                max_ai_generations_per_month, max_images_per_post, max_brands, \
                max_social_accounts, is_active \
         FROM subscription_plans \
         WHERE tier = $1 AND is_active = true",
    )
    .bind(tier)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns a plan row by internal id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_plan_by_id(pool: &PgPool, plan_id: i64) -> Result<Option<PlanRow>, DbError> {
    let row = sqlx::query_as::<_, PlanRow>(
        "SELECT id, tier, name, monthly_price, currency, max_posts_per_month, \
                max_ai_generations_per_month, max_images_per_post, max_brands, \
                max_social_accounts, is_active \
         FROM subscription_plans \
         WHERE id = $1",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Upserts one plan definition, keyed on `tier`. Used by plan seeding.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_plan(pool: &PgPool, seed: &postdeck_core::PlanSeed) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO subscription_plans \
             (tier, name, monthly_price, currency, max_posts_per_month, \
              max_ai_generations_per_month, max_images_per_post, max_brands, \
              max_social_accounts, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true) \
         ON CONFLICT (tier) DO UPDATE SET \
             name                         = EXCLUDED.name, \
             monthly_price                = EXCLUDED.monthly_price, \
             currency                     = EXCLUDED.currency, \
             max_posts_per_month          = EXCLUDED.max_posts_per_month, \
             max_ai_generations_per_month = EXCLUDED.max_ai_generations_per_month, \
             max_images_per_post          = EXCLUDED.max_images_per_post, \
             max_brands                   = EXCLUDED.max_brands, \
             max_social_accounts          = EXCLUDED.max_social_accounts, \
             is_active                    = true, \
             updated_at                   = NOW() \
         RETURNING id",
    )
    .bind(seed.tier.as_str())
    .bind(&seed.name)
    .bind(seed.monthly_price)
    .bind(&seed.currency)
    .bind(seed.max_posts_per_month)
    .bind(seed.max_ai_generations_per_month)
    .bind(seed.max_images_per_post)
    .bind(seed.max_brands)
    .bind(seed.max_social_accounts)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Subscription queries
// ---------------------------------------------------------------------------

/// Returns the user's most recent active subscription, or `None`.
///
/// "Active" means status `trialing` or `active` AND a `current_period_end`
/// that is NULL or in the future. Anything else falls back to free tier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_active_subscription(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<SubscriptionRow>, DbError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
         WHERE user_id = $1 \
           AND status IN ('trialing', 'active') \
           AND (current_period_end IS NULL OR current_period_end > NOW()) \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns a subscription by the payment processor's id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_subscription_by_external_id(
    pool: &PgPool,
    external_id: &str,
) -> Result<Option<SubscriptionRow>, DbError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
         WHERE external_subscription_id = $1"
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Upserts subscription state from a webhook event, keyed on the processor's
/// subscription id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_subscription_from_webhook(
    pool: &PgPool,
    user_id: i64,
    plan_id: i64,
    external_subscription_id: &str,
    status: &str,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
) -> Result<SubscriptionRow, DbError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "INSERT INTO subscriptions \
             (user_id, plan_id, status, external_subscription_id, \
              current_period_start, current_period_end, cancel_at_period_end) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (external_subscription_id) DO UPDATE SET \
             plan_id              = EXCLUDED.plan_id, \
             status               = EXCLUDED.status, \
             current_period_start = EXCLUDED.current_period_start, \
             current_period_end   = EXCLUDED.current_period_end, \
             cancel_at_period_end = EXCLUDED.cancel_at_period_end, \
             updated_at           = NOW() \
         RETURNING {SUBSCRIPTION_COLUMNS}"
    ))
    .bind(user_id)
    .bind(plan_id)
    .bind(status)
    .bind(external_subscription_id)
    .bind(period_start)
    .bind(period_end)
    .bind(cancel_at_period_end)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Billing history / coupons / marketing events
// ---------------------------------------------------------------------------

/// Appends one payment record.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn append_billing_history(
    pool: &PgPool,
    user_id: i64,
    subscription_id: Option<i64>,
    external_payment_id: Option<&str>,
    amount: Decimal,
    currency: &str,
    status: &str,
    occurred_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO billing_history \
             (user_id, subscription_id, external_payment_id, amount, currency, status, occurred_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(user_id)
    .bind(subscription_id)
    .bind(external_payment_id)
    .bind(amount)
    .bind(currency)
    .bind(status)
    .bind(occurred_at)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Returns a coupon by code (case-insensitive), or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_coupon_by_code(pool: &PgPool, code: &str) -> Result<Option<CouponRow>, DbError> {
    let row = sqlx::query_as::<_, CouponRow>(
        "SELECT id, code, percent_off, max_redemptions, redeemed_count, expires_at, is_active \
         FROM coupons WHERE LOWER(code) = LOWER($1)",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Atomically increments a coupon's redemption count, respecting the cap.
///
/// Returns `true` if a redemption was recorded, `false` when the coupon is
/// exhausted, expired, or inactive (the WHERE clause matched nothing).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn apply_coupon_redemption(pool: &PgPool, coupon_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE coupons \
         SET redeemed_count = redeemed_count + 1 \
         WHERE id = $1 AND is_active = true \
           AND (expires_at IS NULL OR expires_at > NOW()) \
           AND (max_redemptions IS NULL OR redeemed_count < max_redemptions)",
    )
    .bind(coupon_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Appends one marketing event.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_marketing_event(
    pool: &PgPool,
    user_id: Option<i64>,
    event_type: &str,
    payload: &Value,
) -> Result<(), DbError> {
    sqlx::query("INSERT INTO marketing_events (user_id, event_type, payload) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(event_type)
        .bind(payload)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
        max_redemptions: Option<i64>,
        redeemed_count: i64,
    ) -> CouponRow {
        CouponRow {
            id: 1,
            code: "LAUNCH20".to_owned(),
            percent_off: 20,
            max_redemptions,
            redeemed_count,
            expires_at,
            is_active,
        }
    }

    #[test]
    fn coupon_redeemable_when_active_and_under_cap() {
        let now = Utc::now();
        assert!(coupon(true, None, Some(100), 99).is_redeemable(now));
        assert!(coupon(true, None, None, 1_000_000).is_redeemable(now));
    }

    #[test]
    fn coupon_not_redeemable_when_exhausted_expired_or_inactive() {
        let now = Utc::now();
        assert!(!coupon(true, None, Some(100), 100).is_redeemable(now));
        assert!(!coupon(true, Some(now - chrono::Duration::days(1)), None, 0).is_redeemable(now));
        assert!(!coupon(false, None, None, 0).is_redeemable(now));
    }
}
