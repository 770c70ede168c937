//! Brand handlers: list, create, detail, update, soft delete.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{
    map_db_error, plan_limit, resolve_brand, user_capabilities, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateBrandRequest {
    pub name: String,
    pub timezone: Option<String>,
}

// Option<Option<T>> is intentional: outer None = "not in request" (keep current),
// Some(None) = "explicitly cleared", Some(Some(v)) = "set to value" (PATCH semantics).
#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(in crate::api) struct UpdateBrandRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub timezone: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct BrandView {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub timezone: Option<String>,
    pub aggregator_profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<postdeck_db::BrandRow> for BrandView {
    fn from(row: postdeck_db::BrandRow) -> Self {
        Self {
            id: row.public_id,
            name: row.name,
            slug: row.slug,
            timezone: row.timezone,
            aggregator_profile_id: row.aggregator_profile_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_name(req_id: &str, name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.len() > 120 {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            "name must be 1-120 characters",
        ));
    }
    Ok(())
}

fn map_unique_violation(req_id: &str, e: &postdeck_db::DbError) -> ApiError {
    if e.is_unique_violation() {
        return ApiError::new(req_id, "conflict", "a brand with that name already exists");
    }
    map_db_error(req_id.to_owned(), e)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/brands — list the user's active brands.
pub(in crate::api) async fn list_brands(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<BrandView>>>, ApiError> {
    let rows = postdeck_db::list_active_brands(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(BrandView::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/brands — create a brand, plan-gated.
///
/// When the aggregator client is configured, a remote profile is created for
/// the brand best-effort: a failure there is logged and the brand still comes
/// back without a profile id (a later sync can repair it).
pub(in crate::api) async fn create_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateBrandRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BrandView>>), ApiError> {
    let rid = &req_id.0;

    let name = body.name.trim().to_owned();
    validate_name(rid, &name)?;

    let (_, _, _, caps) = user_capabilities(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !caps.can_create_brand {
        return Err(plan_limit(rid, "brand limit reached for the current plan"));
    }

    let slug = postdeck_core::slug_from_name(&name);
    let mut row = postdeck_db::create_brand(
        &state.pool,
        user.id,
        &name,
        &slug,
        body.timezone.as_deref(),
    )
    .await
    .map_err(|e| map_unique_violation(rid, &e))?;

    if let Some(social) = &state.social {
        match social.create_profile(&name).await {
            Ok(profile) => {
                if let Err(e) =
                    postdeck_db::set_brand_profile_id(&state.pool, row.id, &profile.id).await
                {
                    tracing::error!(error = %e, brand_id = row.id, "failed to store aggregator profile id");
                } else {
                    row.aggregator_profile_id = Some(profile.id);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, brand_id = row.id, "aggregator profile creation failed");
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: BrandView::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/brands/:slug — brand detail.
pub(in crate::api) async fn get_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<BrandView>>, ApiError> {
    let row = resolve_brand(&state.pool, user.id, &slug, &req_id.0).await?;
    Ok(Json(ApiResponse {
        data: BrandView::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PATCH /api/v1/brands/:slug — sparse update of name/timezone.
pub(in crate::api) async fn update_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(body): Json<UpdateBrandRequest>,
) -> Result<Json<ApiResponse<BrandView>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user.id, &slug, rid).await?;

    let trimmed_name = body.name.as_ref().map(|n| n.trim().to_owned());
    if let Some(ref name) = trimmed_name {
        validate_name(rid, name)?;
    }

    let timezone = body
        .timezone
        .as_ref()
        .map(|opt| opt.as_deref());

    let row = postdeck_db::update_brand(&state.pool, brand.id, trimmed_name.as_deref(), timezone)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: BrandView::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/brands/:slug — soft delete.
///
/// The aggregator profile is deleted best-effort afterwards; failure there is
/// logged and swallowed so the local delete always wins.
pub(in crate::api) async fn delete_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user.id, &slug, rid).await?;

    postdeck_db::deactivate_brand(&state.pool, brand.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    if let (Some(social), Some(profile_id)) = (&state.social, &brand.aggregator_profile_id) {
        if let Err(e) = social.delete_profile(profile_id).await {
            tracing::warn!(
                error = %e,
                brand_id = brand.id,
                profile_id,
                "aggregator profile cleanup failed after brand delete"
            );
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{seed_brand, seed_user_with_session, test_state};
    use crate::api::{build_app, default_rate_limit_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn authed(method: &str, uri: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"));
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_brand_returns_created_with_slug(pool: sqlx::PgPool) {
        let (_uid, token) = seed_user_with_session(&pool, "brands-create@test.example").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(authed(
                "POST",
                "/api/v1/brands",
                &token,
                Some(serde_json::json!({ "name": "Acme Coffee Roasters" })),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["data"]["slug"].as_str(), Some("acme-coffee-roasters"));
        assert!(json["data"]["aggregator_profile_id"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn duplicate_brand_name_conflicts(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "brands-dup@test.example").await;
        seed_brand(&pool, uid, "acme").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(authed(
                "POST",
                "/api/v1/brands",
                &token,
                Some(serde_json::json!({ "name": "Acme" })),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn brand_creation_is_plan_gated(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "brands-gate@test.example").await;
        // Free tier allows exactly one brand.
        seed_brand(&pool, uid, "first-brand").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(authed(
                "POST",
                "/api/v1/brands",
                &token,
                Some(serde_json::json!({ "name": "Second Brand" })),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["error"]["code"].as_str(), Some("plan_limit"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn empty_name_is_a_validation_error(pool: sqlx::PgPool) {
        let (_uid, token) = seed_user_with_session(&pool, "brands-val@test.example").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(authed(
                "POST",
                "/api/v1/brands",
                &token,
                Some(serde_json::json!({ "name": "   " })),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let explicit: super::UpdateBrandRequest =
            serde_json::from_str(r#"{"timezone": null}"#).expect("parse");
        assert_eq!(explicit.timezone, Some(None));

        let absent: super::UpdateBrandRequest = serde_json::from_str("{}").expect("parse");
        assert_eq!(absent.timezone, None);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn patch_clears_timezone_with_explicit_null(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "brands-patch@test.example").await;
        postdeck_db::create_brand(&pool, uid, "Tz Brand", "tz-brand", Some("America/Chicago"))
            .await
            .expect("create brand");
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(authed(
                "PATCH",
                "/api/v1/brands/tz-brand",
                &token,
                Some(serde_json::json!({ "timezone": null })),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert!(json["data"]["timezone"].is_null(), "explicit null must clear");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn deleted_brand_disappears_from_list_and_detail(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "brands-del@test.example").await;
        seed_brand(&pool, uid, "doomed").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .clone()
            .oneshot(authed("DELETE", "/api/v1/brands/doomed", &token, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(authed("GET", "/api/v1/brands/doomed", &token, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn brands_are_scoped_to_their_owner(pool: sqlx::PgPool) {
        let (owner_id, _) = seed_user_with_session(&pool, "brands-owner@test.example").await;
        let (_other_id, other_token) =
            seed_user_with_session(&pool, "brands-other@test.example").await;
        seed_brand(&pool, owner_id, "private-brand").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(authed(
                "GET",
                "/api/v1/brands/private-brand",
                &other_token,
                None,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
