//! Social account handlers: local listing, aggregator reconciliation, link
//! URL generation, and manual disconnect.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    map_db_error, map_social_error, not_configured, plan_limit, resolve_brand, user_capabilities,
    ApiError, ApiResponse, AppState, ResponseMeta,
};

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(in crate::api) struct AccountView {
    pub id: i64,
    pub platform: String,
    pub display_name: Option<String>,
    pub connected: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl From<postdeck_db::SocialAccountRow> for AccountView {
    fn from(row: postdeck_db::SocialAccountRow) -> Self {
        Self {
            id: row.id,
            platform: row.platform,
            display_name: row.display_name,
            connected: !row.manually_disconnected,
            last_synced_at: row.last_synced_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct SyncResult {
    pub synced: usize,
    pub accounts: Vec<AccountView>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct LinkRequest {
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct LinkView {
    pub url: String,
}

// ---------------------------------------------------------------------------
// Shared sync routine
// ---------------------------------------------------------------------------

/// Reconciles a brand's local accounts against the aggregator's list.
///
/// Upserts every remote account keyed by its aggregator id. When
/// `fresh_reconnect` is true (the user just completed the OAuth flow) any
/// manual-disconnect flags are cleared; otherwise they are preserved.
/// Creates the brand's aggregator profile first when it is missing.
pub(in crate::api) async fn sync_brand_accounts(
    state: &AppState,
    brand: &postdeck_db::BrandRow,
    fresh_reconnect: bool,
    rid: &str,
) -> Result<usize, ApiError> {
    let Some(social) = &state.social else {
        return Err(not_configured(rid, "the aggregator client"));
    };

    let profile_id = match &brand.aggregator_profile_id {
        Some(id) => id.clone(),
        None => {
            // Brand predates aggregator configuration or profile creation
            // failed at create time; repair it now.
            let profile = social
                .create_profile(&brand.name)
                .await
                .map_err(|e| map_social_error(rid, &e))?;
            postdeck_db::set_brand_profile_id(&state.pool, brand.id, &profile.id)
                .await
                .map_err(|e| map_db_error(rid.to_owned(), &e))?;
            profile.id
        }
    };

    let remote = social
        .list_accounts(&profile_id)
        .await
        .map_err(|e| map_social_error(rid, &e))?;

    for account in &remote {
        postdeck_db::upsert_social_account(
            &state.pool,
            brand.id,
            &account.platform,
            &account.id,
            account.display_name.as_deref(),
            &account.metadata,
            fresh_reconnect,
        )
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    }

    Ok(remote.len())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/brands/:slug/accounts — local account rows only.
pub(in crate::api) async fn list_accounts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Vec<AccountView>>>, ApiError> {
    let brand = resolve_brand(&state.pool, user.id, &slug, &req_id.0).await?;
    let rows = postdeck_db::list_accounts_for_brand(&state.pool, brand.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(AccountView::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/brands/:slug/accounts/sync — reconcile against the aggregator.
pub(in crate::api) async fn sync_accounts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<SyncResult>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user.id, &slug, rid).await?;

    let synced = sync_brand_accounts(&state, &brand, false, rid).await?;

    let rows = postdeck_db::list_accounts_for_brand(&state.pool, brand.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SyncResult {
            synced,
            accounts: rows.into_iter().map(AccountView::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/brands/:slug/accounts/link — hosted OAuth link URL, plan-gated.
pub(in crate::api) async fn generate_link(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(body): Json<LinkRequest>,
) -> Result<Json<ApiResponse<LinkView>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user.id, &slug, rid).await?;

    let redirect_url = body.redirect_url.trim();
    if redirect_url.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "redirect_url must not be empty",
        ));
    }

    let (_, _, _, caps) = user_capabilities(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !caps.can_connect_account {
        return Err(plan_limit(
            rid,
            "social account limit reached for the current plan",
        ));
    }

    let Some(social) = &state.social else {
        return Err(not_configured(rid, "the aggregator client"));
    };
    let Some(profile_id) = &brand.aggregator_profile_id else {
        return Err(ApiError::new(
            rid,
            "conflict",
            "brand has no aggregator profile yet; run an account sync first",
        ));
    };

    let link = social
        .generate_link_url(profile_id, redirect_url)
        .await
        .map_err(|e| map_social_error(rid, &e))?;

    Ok(Json(ApiResponse {
        data: LinkView { url: link.url },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/brands/:slug/accounts/:account_id — manual disconnect.
///
/// Only flags the local row; the platform link at the aggregator stays in
/// place so a later reconnect restores it without a new OAuth round.
pub(in crate::api) async fn disconnect_account(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path((slug, account_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user.id, &slug, rid).await?;

    let account = postdeck_db::get_account_for_brand(&state.pool, brand.id, account_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(rid, "not_found", format!("no account {account_id} on this brand"))
        })?;

    postdeck_db::set_manually_disconnected(&state.pool, account.id, true)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{seed_brand, seed_user_with_session, test_state};
    use crate::api::{build_app, default_rate_limit_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn seed_account(
        pool: &sqlx::PgPool,
        brand_id: i64,
        platform: &str,
        aggregator_id: &str,
    ) -> i64 {
        postdeck_db::upsert_social_account(
            pool,
            brand_id,
            platform,
            aggregator_id,
            Some("@handle"),
            &serde_json::json!({}),
            false,
        )
        .await
        .expect("seed account")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_accounts_reports_connection_state(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "accounts-list@test.example").await;
        let brand = seed_brand(&pool, uid, "acct-brand").await;
        let connected = seed_account(&pool, brand.id, "instagram", "acct_1").await;
        let disconnected = seed_account(&pool, brand.id, "tiktok", "acct_2").await;
        postdeck_db::set_manually_disconnected(&pool, disconnected, true)
            .await
            .expect("disconnect");

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/brands/acct-brand/accounts")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 2);

        let by_id = |id: i64| {
            data.iter()
                .find(|a| a["id"].as_i64() == Some(id))
                .expect("account present")
        };
        assert_eq!(by_id(connected)["connected"].as_bool(), Some(true));
        assert_eq!(by_id(disconnected)["connected"].as_bool(), Some(false));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn sync_without_aggregator_client_is_not_configured(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "accounts-sync@test.example").await;
        seed_brand(&pool, uid, "sync-brand").await;

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/brands/sync-brand/accounts/sync")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["error"]["code"].as_str(), Some("not_configured"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn disconnect_flags_the_row_and_404s_on_foreign_accounts(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "accounts-disc@test.example").await;
        let brand = seed_brand(&pool, uid, "disc-brand").await;
        let account_id = seed_account(&pool, brand.id, "instagram", "acct_9").await;

        let app = build_app(test_state(pool.clone()), default_rate_limit_state());
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/brands/disc-brand/accounts/{account_id}"))
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let row = postdeck_db::get_account_for_brand(&pool, brand.id, account_id)
            .await
            .expect("query")
            .expect("row");
        assert!(row.manually_disconnected);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/brands/disc-brand/accounts/999999")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
