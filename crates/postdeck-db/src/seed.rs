use sqlx::PgPool;

use crate::DbError;

/// Upsert subscription plans from seed config into the database.
///
/// Returns the number of plans processed (inserted or updated).
/// All upserts run inside a single transaction; if any operation fails
/// the entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_plans(pool: &PgPool, plans: &[postdeck_core::PlanSeed]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for plan in plans {
        sqlx::query(
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
                 updated_at                   = NOW()",
        )
        .bind(plan.tier.as_str())
        .bind(&plan.name)
        .bind(plan.monthly_price)
        .bind(&plan.currency)
        .bind(plan.max_posts_per_month)
        .bind(plan.max_ai_generations_per_month)
        .bind(plan.max_images_per_post)
        .bind(plan.max_brands)
        .bind(plan.max_social_accounts)
        .execute(&mut *tx)
        .await?;
        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
