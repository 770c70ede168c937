//! Engagement read endpoints.
//!
//! All aggregation semantics live in `postdeck_core::engagement`; handlers
//! only load snapshot rows and shape the response.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use postdeck_core::{daily_trend, per_platform_maxima, post_engagement, EngagementCounters,
    PlatformEngagement};

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, resolve_brand, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(in crate::api) struct PostAnalyticsView {
    pub post_id: Uuid,
    pub totals: EngagementCounters,
    pub platforms: Vec<PlatformEngagement>,
    pub snapshot_count: usize,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct TrendPoint {
    pub date: NaiveDate,
    pub counters: EngagementCounters,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct BrandAnalyticsView {
    pub brand_slug: String,
    pub totals: EngagementCounters,
    pub trend: Vec<TrendPoint>,
    pub snapshot_count: usize,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct BrandAnalyticsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET /api/v1/analytics/posts/:post_id — current engagement for one post.
pub(in crate::api) async fn post_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PostAnalyticsView>>, ApiError> {
    let rid = &req_id.0;
    let post = postdeck_db::get_post_by_public_id(&state.pool, user.id, post_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("no post {post_id}")))?;

    let snapshots: Vec<_> = postdeck_db::list_snapshots_for_post(&state.pool, post.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .into_iter()
        .map(postdeck_db::AnalyticsSnapshotRow::into_snapshot)
        .collect();

    Ok(Json(ApiResponse {
        data: PostAnalyticsView {
            post_id,
            totals: post_engagement(&snapshots),
            platforms: per_platform_maxima(&snapshots),
            snapshot_count: snapshots.len(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/analytics/brands/:slug — brand totals plus a daily trend,
/// optionally bounded by `from`/`to` query parameters.
pub(in crate::api) async fn brand_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Query(query): Query<BrandAnalyticsQuery>,
) -> Result<Json<ApiResponse<BrandAnalyticsView>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user.id, &slug, rid).await?;

    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "'from' must not be after 'to'",
            ));
        }
    }

    let rows = postdeck_db::list_snapshots_for_brand(&state.pool, brand.id, query.from, query.to)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    // Brand totals keep the per-post semantics: snapshots are cumulative
    // within one post × platform, so totals sum post-level engagement rather
    // than taking brand-wide maxima.
    let mut by_post: BTreeMap<i64, Vec<postdeck_core::EngagementSnapshot>> = BTreeMap::new();
    let mut snapshots = Vec::with_capacity(rows.len());
    for row in rows {
        let post_id = row.post_id;
        let snapshot = row.into_snapshot();
        by_post.entry(post_id).or_default().push(snapshot.clone());
        snapshots.push(snapshot);
    }
    let totals = by_post
        .values()
        .fold(EngagementCounters::default(), |acc, group| {
            acc.add(post_engagement(group))
        });

    let trend = daily_trend(&snapshots)
        .into_iter()
        .map(|(date, counters)| TrendPoint { date, counters })
        .collect();

    Ok(Json(ApiResponse {
        data: BrandAnalyticsView {
            brand_slug: brand.slug,
            totals,
            trend,
            snapshot_count: snapshots.len(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{seed_brand, seed_user_with_session, test_state};
    use crate::api::{build_app, default_rate_limit_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    fn get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn post_analytics_takes_platform_maxima(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "analytics-post@test.example").await;
        let brand = seed_brand(&pool, uid, "ana-brand").await;
        let post = postdeck_db::create_post(
            &pool,
            brand.id,
            "measured",
            None,
            &serde_json::json!([]),
            &serde_json::json!([]),
        )
        .await
        .expect("post");

        // Cumulative snapshots: instagram grows 10 -> 25, twitter stays at 5.
        let day1 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        for (platform, at, likes) in [
            ("instagram", day1, 10),
            ("instagram", day2, 25),
            ("twitter", day1, 5),
        ] {
            postdeck_db::insert_analytics_snapshot(&pool, post.id, platform, at, likes, 0, 0, likes * 10)
                .await
                .expect("snapshot");
        }

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(get(
                &format!("/api/v1/analytics/posts/{}", post.public_id),
                &token,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["totals"]["likes"].as_i64(), Some(30));
        assert_eq!(json["data"]["snapshot_count"].as_u64(), Some(3));
        let platforms = json["data"]["platforms"].as_array().expect("platforms");
        assert_eq!(platforms.len(), 2);
        assert_eq!(platforms[0]["platform"].as_str(), Some("instagram"));
        assert_eq!(platforms[0]["counters"]["likes"].as_i64(), Some(25));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn post_with_no_snapshots_reports_zeros(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "analytics-empty@test.example").await;
        let brand = seed_brand(&pool, uid, "empty-brand").await;
        let post = postdeck_db::create_post(
            &pool,
            brand.id,
            "quiet",
            None,
            &serde_json::json!([]),
            &serde_json::json!([]),
        )
        .await
        .expect("post");

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(get(
                &format!("/api/v1/analytics/posts/{}", post.public_id),
                &token,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["totals"]["likes"].as_i64(), Some(0));
        assert_eq!(json["data"]["snapshot_count"].as_u64(), Some(0));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn brand_trend_sums_per_day_and_respects_the_range(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "analytics-brand@test.example").await;
        let brand = seed_brand(&pool, uid, "trend-brand").await;
        let post = postdeck_db::create_post(
            &pool,
            brand.id,
            "trending",
            None,
            &serde_json::json!([]),
            &serde_json::json!([]),
        )
        .await
        .expect("post");

        let day1 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let day3 = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
        for (platform, at, likes) in [
            ("instagram", day1, 10),
            ("twitter", day1, 5),
            ("instagram", day3, 25),
        ] {
            postdeck_db::insert_analytics_snapshot(&pool, post.id, platform, at, likes, 0, 0, 0)
                .await
                .expect("snapshot");
        }

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .clone()
            .oneshot(get("/api/v1/analytics/brands/trend-brand", &token))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;

        let trend = json["data"]["trend"].as_array().expect("trend");
        assert_eq!(trend.len(), 2, "day 2 has no snapshots and is absent");
        assert_eq!(trend[0]["date"].as_str(), Some("2026-03-01"));
        assert_eq!(trend[0]["counters"]["likes"].as_i64(), Some(15));

        // A bounded range drops the day-3 snapshot.
        let response = app
            .oneshot(get(
                "/api/v1/analytics/brands/trend-brand?from=2026-03-01T00:00:00Z&to=2026-03-02T00:00:00Z",
                &token,
            ))
            .await
            .expect("response");
        let json = body_json(response).await;
        assert_eq!(json["data"]["trend"].as_array().expect("trend").len(), 1);
        assert_eq!(json["data"]["snapshot_count"].as_u64(), Some(2));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn inverted_range_is_rejected(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "analytics-range@test.example").await;
        seed_brand(&pool, uid, "range-brand").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(get(
                "/api/v1/analytics/brands/range-brand?from=2026-03-05T00:00:00Z&to=2026-03-01T00:00:00Z",
                &token,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn foreign_post_analytics_is_not_found(pool: sqlx::PgPool) {
        let (owner_id, _) = seed_user_with_session(&pool, "analytics-owner@test.example").await;
        let (_, other_token) = seed_user_with_session(&pool, "analytics-other@test.example").await;
        let brand = seed_brand(&pool, owner_id, "private-brand").await;
        let post = postdeck_db::create_post(
            &pool,
            brand.id,
            "mine",
            None,
            &serde_json::json!([]),
            &serde_json::json!([]),
        )
        .await
        .expect("post");

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(get(
                &format!("/api/v1/analytics/posts/{}", post.public_id),
                &other_token,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
