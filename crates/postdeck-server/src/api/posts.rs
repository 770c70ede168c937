//! Post handlers: CRUD plus scheduling targets for publication.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{
    effective_plan, map_db_error, plan_limit, resolve_brand, user_capabilities, ApiError,
    ApiResponse, AppState, ResponseMeta,
};

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreatePostRequest {
    pub brand_slug: String,
    pub body: String,
    #[serde(default)]
    pub ai_caption: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(in crate::api) struct UpdatePostRequest {
    pub body: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub ai_caption: Option<Option<String>>,
    pub image_urls: Option<Vec<String>>,
    pub platforms: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct ListPostsQuery {
    pub brand_slug: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct SchedulePostRequest {
    pub publish_at: DateTime<Utc>,
    pub account_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct PostView {
    pub id: Uuid,
    pub body: String,
    pub ai_caption: Option<String>,
    pub image_urls: serde_json::Value,
    pub platforms: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<postdeck_db::PostRow> for PostView {
    fn from(row: postdeck_db::PostRow) -> Self {
        Self {
            id: row.public_id,
            body: row.body,
            ai_caption: row.ai_caption,
            image_urls: row.image_urls,
            platforms: row.platforms,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct ScheduleView {
    pub post_id: Uuid,
    pub status: String,
    pub targets: usize,
    pub publish_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

const MAX_BODY_CHARS: usize = 5_000;

fn validate_body_text(rid: &str, body: &str) -> Result<(), ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::new(rid, "validation_error", "post body must not be empty"));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("post body must be at most {MAX_BODY_CHARS} characters"),
        ));
    }
    Ok(())
}

fn validate_image_count(
    rid: &str,
    count: usize,
    limits: &postdeck_core::PlanLimits,
) -> Result<(), ApiError> {
    if !postdeck_core::images_within_limit(count, limits) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!(
                "too many images for the current plan (max {})",
                limits
                    .max_images_per_post
                    .map_or_else(|| "unlimited".to_owned(), |cap| cap.to_string())
            ),
        ));
    }
    Ok(())
}

fn string_vec_to_json(values: &[String]) -> serde_json::Value {
    serde_json::Value::Array(
        values
            .iter()
            .map(|v| serde_json::Value::String(v.clone()))
            .collect(),
    )
}

async fn resolve_post(
    pool: &sqlx::PgPool,
    user_id: i64,
    post_id: Uuid,
    rid: &str,
) -> Result<postdeck_db::PostRow, ApiError> {
    postdeck_db::get_post_by_public_id(pool, user_id, post_id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("no post {post_id}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/posts — list posts, optionally for one brand.
pub(in crate::api) async fn list_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ApiResponse<Vec<PostView>>>, ApiError> {
    let rid = &req_id.0;
    let brand_id = match &query.brand_slug {
        Some(slug) => Some(resolve_brand(&state.pool, user.id, slug, rid).await?.id),
        None => None,
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let rows = postdeck_db::list_posts_for_user(&state.pool, user.id, brand_id, limit)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(PostView::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/posts — create a draft post, plan-gated.
pub(in crate::api) async fn create_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PostView>>), ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user.id, &body.brand_slug, rid).await?;

    validate_body_text(rid, &body.body)?;

    let (_, limits, _, caps) = user_capabilities(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !caps.can_create_post {
        return Err(plan_limit(rid, "monthly post limit reached for the current plan"));
    }
    validate_image_count(rid, body.image_urls.len(), &limits)?;

    let row = postdeck_db::create_post(
        &state.pool,
        brand.id,
        body.body.trim(),
        body.ai_caption.as_deref(),
        &string_vec_to_json(&body.image_urls),
        &string_vec_to_json(&body.platforms),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: PostView::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/posts/:post_id — post detail.
pub(in crate::api) async fn get_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PostView>>, ApiError> {
    let row = resolve_post(&state.pool, user.id, post_id, &req_id.0).await?;
    Ok(Json(ApiResponse {
        data: PostView::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PATCH /api/v1/posts/:post_id — sparse update of a draft.
pub(in crate::api) async fn update_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<Uuid>,
    Json(body): Json<UpdatePostRequest>,
) -> Result<Json<ApiResponse<PostView>>, ApiError> {
    let rid = &req_id.0;
    let post = resolve_post(&state.pool, user.id, post_id, rid).await?;

    if post.status != "draft" {
        return Err(ApiError::new(
            rid,
            "conflict",
            format!("only draft posts can be edited (status is '{}')", post.status),
        ));
    }

    if let Some(ref text) = body.body {
        validate_body_text(rid, text)?;
    }
    if let Some(ref images) = body.image_urls {
        let (_, limits, _) = effective_plan(&state.pool, user.id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
        validate_image_count(rid, images.len(), &limits)?;
    }

    let image_urls = body.image_urls.as_deref().map(string_vec_to_json);
    let platforms = body.platforms.as_deref().map(string_vec_to_json);
    let ai_caption = body.ai_caption.as_ref().map(|opt| opt.as_deref());

    let row = postdeck_db::update_post(
        &state.pool,
        post.id,
        body.body.as_deref().map(str::trim),
        ai_caption,
        image_urls.as_ref(),
        platforms.as_ref(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PostView::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/posts/:post_id — hard delete; targets and analytics cascade.
pub(in crate::api) async fn delete_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let rid = &req_id.0;
    let post = resolve_post(&state.pool, user.id, post_id, rid).await?;

    postdeck_db::delete_post(&state.pool, post.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/posts/:post_id/schedule — create publish targets.
///
/// Rejects a `publish_at` in the past and any target account that is
/// disconnected or belongs to another brand. On success the post flips to
/// `scheduled` and the background job picks the targets up when due.
pub(in crate::api) async fn schedule_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<Uuid>,
    Json(body): Json<SchedulePostRequest>,
) -> Result<Json<ApiResponse<ScheduleView>>, ApiError> {
    let rid = &req_id.0;
    let post = resolve_post(&state.pool, user.id, post_id, rid).await?;

    if post.status != "draft" {
        return Err(ApiError::new(
            rid,
            "conflict",
            format!("post is already {}", post.status),
        ));
    }
    if body.account_ids.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "at least one target account is required",
        ));
    }
    if body.publish_at <= Utc::now() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "publish_at must be in the future",
        ));
    }

    // Every target must be a connected account on the post's brand.
    for account_id in &body.account_ids {
        let account = postdeck_db::get_account_for_brand(&state.pool, post.brand_id, *account_id)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .ok_or_else(|| {
                ApiError::new(
                    rid,
                    "validation_error",
                    format!("account {account_id} does not belong to this post's brand"),
                )
            })?;
        if account.manually_disconnected {
            return Err(ApiError::new(
                rid,
                "validation_error",
                format!("account {account_id} ({}) is disconnected", account.platform),
            ));
        }
    }

    for account_id in &body.account_ids {
        postdeck_db::create_scheduled_post(&state.pool, post.id, *account_id, body.publish_at)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    ApiError::new(rid, "conflict", format!("account {account_id} is already a target"))
                } else {
                    map_db_error(rid.clone(), &e)
                }
            })?;
    }

    postdeck_db::set_post_status(&state.pool, post.id, "scheduled")
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ScheduleView {
            post_id,
            status: "scheduled".to_owned(),
            targets: body.account_ids.len(),
            publish_at: body.publish_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
