//! User settings handlers.
//!
//! The first GET inserts a defaults row. The default timezone comes from a
//! best-effort geo-IP lookup on the caller's address; lookup failures fall
//! back to UTC and are never surfaced.

use axum::{
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geoip;
use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

const FALLBACK_TIMEZONE: &str = "UTC";

#[derive(Debug, Serialize)]
pub(in crate::api) struct SettingsView {
    pub timezone: String,
    pub locale: String,
    pub default_hashtags: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl From<postdeck_db::UserSettingsRow> for SettingsView {
    fn from(row: postdeck_db::UserSettingsRow) -> Self {
        Self {
            timezone: row.timezone,
            locale: row.locale,
            default_hashtags: row.default_hashtags,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct UpdateSettingsRequest {
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub default_hashtags: Option<Vec<String>>,
}

/// Extracts the originating client IP from `x-forwarded-for` (first hop).
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// GET /api/v1/settings — returns settings, creating defaults on first read.
pub(in crate::api) async fn get_settings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<SettingsView>>, ApiError> {
    let rid = &req_id.0;

    let default_timezone = match client_ip(&headers) {
        Some(ip) => geoip::lookup_timezone(&state.config.geoip_base_url, &ip)
            .await
            .unwrap_or_else(|| FALLBACK_TIMEZONE.to_owned()),
        None => FALLBACK_TIMEZONE.to_owned(),
    };

    let row = postdeck_db::get_or_create_settings(&state.pool, user.id, &default_timezone)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SettingsView::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PUT /api/v1/settings — sparse update; omitted fields are left alone.
pub(in crate::api) async fn update_settings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<SettingsView>>, ApiError> {
    let rid = &req_id.0;

    if let Some(tz) = body.timezone.as_deref() {
        if tz.trim().is_empty() {
            return Err(ApiError::new(rid, "validation_error", "timezone must not be empty"));
        }
    }

    // An update before the first GET has no row to patch; create it first.
    postdeck_db::get_or_create_settings(&state.pool, user.id, FALLBACK_TIMEZONE)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let hashtags = body.default_hashtags.map(|tags| {
        serde_json::Value::Array(tags.into_iter().map(serde_json::Value::String).collect())
    });

    let row = postdeck_db::update_settings(
        &state.pool,
        user.id,
        body.timezone.as_deref(),
        body.locale.as_deref(),
        hashtags.as_ref(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SettingsView::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::client_ip;
    use crate::api::test_support::{seed_user_with_session, test_state};
    use crate::api::{build_app, default_rate_limit_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{HeaderMap, Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn client_ip_takes_the_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));

        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn first_get_creates_default_settings(pool: sqlx::PgPool) {
        let (_uid, token) = seed_user_with_session(&pool, "settings@test.example").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/settings")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        // Geo-IP is unreachable in tests; timezone falls back to UTC.
        assert_eq!(json["data"]["timezone"].as_str(), Some("UTC"));
        assert_eq!(json["data"]["locale"].as_str(), Some("en-US"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn put_updates_only_supplied_fields(pool: sqlx::PgPool) {
        let (_uid, token) = seed_user_with_session(&pool, "settings-put@test.example").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/settings")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "timezone": "Europe/Berlin",
                            "default_hashtags": ["#coffee", "#beans"]
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["data"]["timezone"].as_str(), Some("Europe/Berlin"));
        assert_eq!(json["data"]["locale"].as_str(), Some("en-US"), "locale untouched");
        assert_eq!(
            json["data"]["default_hashtags"].as_array().map(Vec::len),
            Some(2)
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn empty_timezone_is_rejected(pool: sqlx::PgPool) {
        let (_uid, token) = seed_user_with_session(&pool, "settings-tz@test.example").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/settings")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({ "timezone": "  " }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
