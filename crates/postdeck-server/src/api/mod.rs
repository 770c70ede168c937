mod accounts;
mod ai;
mod analytics;
mod billing;
mod brands;
mod limits;
mod oauth;
mod posts;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use postdeck_ai::LlmClient;
use postdeck_billing::BillingClient;
use postdeck_core::{AppConfig, Capabilities, PlanLimits, PlanTier, UsageCounts};
use postdeck_social::SocialApiClient;

use crate::middleware::{enforce_rate_limit, request_id, require_session, RateLimitState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub social: Option<Arc<SocialApiClient>>,
    pub ai: Option<Arc<LlmClient>>,
    pub billing: Option<Arc<BillingClient>>,
}

impl AppState {
    /// Wires up the state from config: each external client is only built
    /// when its API key is configured, and handlers that need a missing one
    /// answer `not_configured`.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured client fails to construct.
    pub fn from_config(pool: PgPool, config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let social = match config.social_api_key.as_deref() {
            Some(key) => Some(Arc::new(SocialApiClient::with_base_url(
                key,
                config.social_request_timeout_secs,
                config.social_max_retries,
                &config.social_api_base_url,
            )?)),
            None => None,
        };
        let ai = match config.llm_api_key.as_deref() {
            Some(key) => Some(Arc::new(LlmClient::new(
                &config.llm_base_url,
                key,
                &config.llm_model,
            )?)),
            None => None,
        };
        let billing = match config.billing_api_key.as_deref() {
            Some(key) => Some(Arc::new(BillingClient::new(&config.billing_base_url, key)?)),
            None => None,
        };
        Ok(Self {
            pool,
            config,
            social,
            ai,
            billing,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" | "plan_limit" => StatusCode::FORBIDDEN,
            "bad_request" => StatusCode::BAD_REQUEST,
            "validation_error" => StatusCode::UNPROCESSABLE_ENTITY,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            "not_configured" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Shared handler helpers
// ---------------------------------------------------------------------------

pub(super) fn map_db_error(request_id: String, error: &postdeck_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn map_social_error(request_id: &str, error: &postdeck_social::SocialApiError) -> ApiError {
    tracing::warn!(error = %error, "aggregator request failed");
    ApiError::new(request_id, "upstream_error", "aggregator request failed")
}

pub(super) fn not_configured(request_id: &str, what: &str) -> ApiError {
    ApiError::new(
        request_id,
        "not_configured",
        format!("{what} is not configured on this server"),
    )
}

pub(super) fn plan_limit(request_id: &str, message: &str) -> ApiError {
    ApiError::new(request_id, "plan_limit", message)
}

/// Deserializer for nullable PATCH fields. A plain `Option<Option<T>>` derive
/// folds a present `null` into the outer `None`, losing the "explicitly
/// cleared" signal; pairing this with `#[serde(default)]` keeps an absent
/// field as `None` while a present `null` arrives as `Some(None)`.
pub(super) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}

/// Resolves a brand slug for the user or answers 404.
pub(super) async fn resolve_brand(
    pool: &PgPool,
    user_id: i64,
    slug: &str,
    request_id: &str,
) -> Result<postdeck_db::BrandRow, ApiError> {
    postdeck_db::get_brand_by_slug(pool, user_id, slug)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(request_id, "not_found", format!("no brand with slug '{slug}'")))
}

/// First instant of the current UTC calendar month, the window monthly caps
/// are counted over.
pub(super) fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// The user's effective plan: the active subscription's plan when one exists,
/// free tier otherwise. DB-seeded caps win over the hardcoded defaults.
pub(super) async fn effective_plan(
    pool: &PgPool,
    user_id: i64,
) -> Result<(PlanTier, PlanLimits, Option<postdeck_db::SubscriptionRow>), postdeck_db::DbError> {
    if let Some(sub) = postdeck_db::get_active_subscription(pool, user_id).await? {
        if let Some(plan) = postdeck_db::get_plan_by_id(pool, sub.plan_id).await? {
            let tier = PlanTier::parse(&plan.tier);
            return Ok((tier, plan.limits(), Some(sub)));
        }
        tracing::warn!(
            user_id,
            plan_id = sub.plan_id,
            "subscription references a missing plan; falling back to free tier"
        );
    }
    let limits = match postdeck_db::get_plan_by_tier(pool, PlanTier::Free.as_str()).await? {
        Some(plan) => plan.limits(),
        None => PlanTier::Free.default_limits(),
    };
    Ok((PlanTier::Free, limits, None))
}

/// Loads the user's current-period usage counters.
pub(super) async fn load_usage(
    pool: &PgPool,
    user_id: i64,
) -> Result<UsageCounts, postdeck_db::DbError> {
    let since = month_start(Utc::now());
    Ok(UsageCounts {
        posts_this_month: postdeck_db::count_posts_created_since(pool, user_id, since).await?,
        ai_generations_this_month: postdeck_db::count_ai_usage_since(pool, user_id, since).await?,
        brands: postdeck_db::count_active_brands(pool, user_id).await?,
        social_accounts: postdeck_db::count_connected_accounts(pool, user_id).await?,
    })
}

/// Evaluates the user's capability flags against their effective plan.
pub(super) async fn user_capabilities(
    pool: &PgPool,
    user_id: i64,
) -> Result<(PlanTier, PlanLimits, UsageCounts, Capabilities), postdeck_db::DbError> {
    let (tier, limits, _) = effective_plan(pool, user_id).await?;
    let usage = load_usage(pool, user_id).await?;
    let caps = Capabilities::evaluate(&limits, &usage);
    Ok((tier, limits, usage, caps))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(state: AppState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/brands",
            get(brands::list_brands).post(brands::create_brand),
        )
        .route(
            "/api/v1/brands/{slug}",
            get(brands::get_brand)
                .patch(brands::update_brand)
                .delete(brands::delete_brand),
        )
        .route("/api/v1/brands/{slug}/accounts", get(accounts::list_accounts))
        .route(
            "/api/v1/brands/{slug}/accounts/sync",
            post(accounts::sync_accounts),
        )
        .route(
            "/api/v1/brands/{slug}/accounts/link",
            post(accounts::generate_link),
        )
        .route(
            "/api/v1/brands/{slug}/accounts/{account_id}",
            axum::routing::delete(accounts::disconnect_account),
        )
        .route("/api/v1/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/api/v1/posts/{post_id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/api/v1/posts/{post_id}/schedule", post(posts::schedule_post))
        .route("/api/v1/analytics/posts/{post_id}", get(analytics::post_analytics))
        .route(
            "/api/v1/analytics/brands/{slug}",
            get(analytics::brand_analytics),
        )
        .route("/api/v1/limits", get(limits::get_limits))
        .route(
            "/api/v1/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/api/v1/ai/caption", post(ai::generate_caption))
        .route("/api/v1/ai/sentiment", post(ai::analyze_sentiment))
        .route("/api/v1/billing/subscription", get(billing::get_subscription))
        .route("/api/v1/billing/checkout", post(billing::create_checkout))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(state, require_session)),
        )
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/billing/webhook", post(billing::webhook))
        .route("/api/v1/oauth/callback", get(oauth::callback));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(state.clone(), rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match postdeck_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
