//! Database-backed tests for the postdeck-db access layer.
//!
//! Uses `#[sqlx::test]` with the workspace migrations; each test gets its own
//! freshly migrated database.

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;

async fn seed_user(pool: &PgPool, email: &str) -> i64 {
    postdeck_db::create_user(pool, email, Some("Test User"))
        .await
        .expect("create user")
        .id
}

async fn seed_brand(pool: &PgPool, user_id: i64, slug: &str) -> i64 {
    postdeck_db::create_brand(pool, user_id, &format!("Brand {slug}"), slug, None)
        .await
        .expect("create brand")
        .id
}

#[sqlx::test(migrations = "../../migrations")]
async fn session_token_resolves_user_until_expiry(pool: PgPool) {
    let user_id = seed_user(&pool, "sessions@example.com").await;
    postdeck_db::create_session(&pool, user_id, "tok-valid", 1)
        .await
        .expect("create session");

    let found = postdeck_db::find_user_by_session_token(&pool, "tok-valid")
        .await
        .expect("lookup");
    assert_eq!(found.expect("session user").user_id, user_id);

    // Expired sessions must not resolve.
    sqlx::query("UPDATE sessions SET expires_at = NOW() - INTERVAL '1 hour' WHERE token = $1")
        .bind("tok-valid")
        .execute(&pool)
        .await
        .expect("expire session");
    let expired = postdeck_db::find_user_by_session_token(&pool, "tok-valid")
        .await
        .expect("lookup expired");
    assert!(expired.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn social_account_upsert_is_idempotent(pool: PgPool) {
    let user_id = seed_user(&pool, "sync@example.com").await;
    let brand_id = seed_brand(&pool, user_id, "sync-brand").await;

    let meta = json!({"handle": "@acme"});
    for _ in 0..2 {
        postdeck_db::upsert_social_account(
            &pool,
            brand_id,
            "instagram",
            "agg-acct-1",
            Some("Acme IG"),
            &meta,
            false,
        )
        .await
        .expect("upsert");
    }

    let accounts = postdeck_db::list_accounts_for_brand(&pool, brand_id)
        .await
        .expect("list");
    assert_eq!(accounts.len(), 1, "two syncs must not duplicate the row");
    assert_eq!(accounts[0].aggregator_account_id, "agg-acct-1");
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_preserves_manual_disconnect_unless_fresh_reconnect(pool: PgPool) {
    let user_id = seed_user(&pool, "disconnect@example.com").await;
    let brand_id = seed_brand(&pool, user_id, "disc-brand").await;
    let meta = json!({});

    let account_id = postdeck_db::upsert_social_account(
        &pool, brand_id, "twitter", "agg-acct-2", None, &meta, false,
    )
    .await
    .expect("insert");

    postdeck_db::set_manually_disconnected(&pool, account_id, true)
        .await
        .expect("disconnect");

    // A routine sync keeps the flag.
    postdeck_db::upsert_social_account(
        &pool, brand_id, "twitter", "agg-acct-2", None, &meta, false,
    )
    .await
    .expect("routine sync");
    let row = postdeck_db::get_account_for_brand(&pool, brand_id, account_id)
        .await
        .expect("get")
        .expect("row");
    assert!(row.manually_disconnected, "routine sync must preserve flag");

    // A fresh OAuth reconnect clears it.
    postdeck_db::upsert_social_account(
        &pool, brand_id, "twitter", "agg-acct-2", None, &meta, true,
    )
    .await
    .expect("reconnect sync");
    let row = postdeck_db::get_account_for_brand(&pool, brand_id, account_id)
        .await
        .expect("get")
        .expect("row");
    assert!(!row.manually_disconnected, "fresh reconnect must clear flag");
}

#[sqlx::test(migrations = "../../migrations")]
async fn active_subscription_ignores_expired_periods(pool: PgPool) {
    let user_id = seed_user(&pool, "subs@example.com").await;

    let seeds = postdeck_core::parse_plan_seeds(
        "plans:\n  - tier: pro\n    name: Pro\n    monthly_price: '29.00'\n    max_posts_per_month: 300\n",
    )
    .expect("seed yaml");
    postdeck_db::seed::seed_plans(&pool, &seeds).await.expect("seed");
    let plan = postdeck_db::get_plan_by_tier(&pool, "pro")
        .await
        .expect("plan query")
        .expect("plan row");

    // An active row whose period already ended does not count.
    postdeck_db::upsert_subscription_from_webhook(
        &pool,
        user_id,
        plan.id,
        "ext-sub-expired",
        "active",
        Some(Utc::now() - Duration::days(60)),
        Some(Utc::now() - Duration::days(30)),
        false,
    )
    .await
    .expect("upsert expired");

    assert!(postdeck_db::get_active_subscription(&pool, user_id)
        .await
        .expect("query")
        .is_none());

    // A current trialing row does.
    postdeck_db::upsert_subscription_from_webhook(
        &pool,
        user_id,
        plan.id,
        "ext-sub-live",
        "trialing",
        Some(Utc::now()),
        Some(Utc::now() + Duration::days(30)),
        false,
    )
    .await
    .expect("upsert live");

    let live = postdeck_db::get_active_subscription(&pool, user_id)
        .await
        .expect("query")
        .expect("active row");
    assert_eq!(live.external_subscription_id.as_deref(), Some("ext-sub-live"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn coupon_redemption_stops_at_the_cap(pool: PgPool) {
    sqlx::query(
        "INSERT INTO coupons (code, percent_off, max_redemptions) VALUES ('LAUNCH20', 20, 2)",
    )
    .execute(&pool)
    .await
    .expect("insert coupon");

    let coupon = postdeck_db::find_coupon_by_code(&pool, "launch20")
        .await
        .expect("find")
        .expect("coupon, case-insensitive");

    assert!(postdeck_db::apply_coupon_redemption(&pool, coupon.id)
        .await
        .expect("first"));
    assert!(postdeck_db::apply_coupon_redemption(&pool, coupon.id)
        .await
        .expect("second"));
    assert!(
        !postdeck_db::apply_coupon_redemption(&pool, coupon.id)
            .await
            .expect("third"),
        "redemption past the cap must be refused"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn usage_counts_are_scoped_to_the_user_and_window(pool: PgPool) {
    let user_id = seed_user(&pool, "usage@example.com").await;
    let other_id = seed_user(&pool, "other@example.com").await;
    let brand_id = seed_brand(&pool, user_id, "usage-brand").await;
    let other_brand = seed_brand(&pool, other_id, "other-brand").await;

    let empty = json!([]);
    for _ in 0..3 {
        postdeck_db::create_post(&pool, brand_id, "hello", None, &empty, &empty)
            .await
            .expect("post");
    }
    postdeck_db::create_post(&pool, other_brand, "not mine", None, &empty, &empty)
        .await
        .expect("other post");

    let since = Utc::now() - Duration::hours(1);
    let count = postdeck_db::count_posts_created_since(&pool, user_id, since)
        .await
        .expect("count");
    assert_eq!(count, 3, "other users' posts must not count");

    postdeck_db::record_ai_usage(&pool, user_id, Some(brand_id), "caption")
        .await
        .expect("ai usage");
    let ai = postdeck_db::count_ai_usage_since(&pool, user_id, since)
        .await
        .expect("ai count");
    assert_eq!(ai, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn analytics_snapshots_round_trip_for_post_and_brand(pool: PgPool) {
    let user_id = seed_user(&pool, "analytics@example.com").await;
    let brand_id = seed_brand(&pool, user_id, "analytics-brand").await;
    let empty = json!([]);
    let post = postdeck_db::create_post(&pool, brand_id, "tracked", None, &empty, &empty)
        .await
        .expect("post");

    postdeck_db::insert_analytics_snapshot(&pool, post.id, "instagram", Utc::now(), 10, 2, 1, 100)
        .await
        .expect("snapshot 1");
    postdeck_db::insert_analytics_snapshot(&pool, post.id, "instagram", Utc::now(), 25, 4, 3, 240)
        .await
        .expect("snapshot 2");

    let rows = postdeck_db::list_snapshots_for_post(&pool, post.id)
        .await
        .expect("list");
    assert_eq!(rows.len(), 2);

    let snapshots: Vec<_> = rows.into_iter().map(|r| r.into_snapshot()).collect();
    let totals = postdeck_core::post_engagement(&snapshots);
    assert_eq!(totals.likes, 25, "max per platform, not sum");

    let brand_rows = postdeck_db::list_snapshots_for_brand(&pool, brand_id, None, None)
        .await
        .expect("brand list");
    assert_eq!(brand_rows.len(), 2);
}
