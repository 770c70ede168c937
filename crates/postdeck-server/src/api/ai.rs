//! AI endpoints: caption generation and comment sentiment.
//!
//! Both are plan-gated through `can_generate_ai` and record a usage row on
//! success so the monthly cap counts completed generations only.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use postdeck_ai::prompts::{
    caption_prompt, parse_sentiment, sentiment_prompt, CAPTION_SYSTEM, SENTIMENT_SYSTEM,
};
use postdeck_ai::{CaptionRequest, SentimentLabel};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    map_db_error, map_social_error, not_configured, plan_limit, resolve_brand, user_capabilities,
    ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CaptionBody {
    pub brand_slug: String,
    pub topic: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct CaptionView {
    pub caption: String,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct SentimentBody {
    pub post_id: Uuid,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct SentimentView {
    pub label: SentimentLabel,
    pub score: f32,
    pub comment_count: usize,
}

/// POST /api/v1/ai/caption — generate a caption for a brand's post idea.
pub(in crate::api) async fn generate_caption(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CaptionBody>,
) -> Result<Json<ApiResponse<CaptionView>>, ApiError> {
    let rid = &req_id.0;
    let Some(ai) = state.ai.clone() else {
        return Err(not_configured(rid, "AI caption generation"));
    };
    let brand = resolve_brand(&state.pool, user.id, &body.brand_slug, rid).await?;

    if body.topic.trim().is_empty() {
        return Err(ApiError::new(rid, "validation_error", "topic must not be empty"));
    }

    let (_, _, _, caps) = user_capabilities(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !caps.can_generate_ai {
        return Err(plan_limit(rid, "monthly AI generation limit reached for the current plan"));
    }

    let request = CaptionRequest {
        topic: body.topic.trim().to_owned(),
        tone: body.tone,
        platform: body.platform,
        hashtags: body.hashtags,
    };
    let caption = ai
        .complete(CAPTION_SYSTEM, &caption_prompt(&request))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "caption generation failed");
            ApiError::new(rid, "upstream_error", "caption generation failed")
        })?;

    postdeck_db::record_ai_usage(&state.pool, user.id, Some(brand.id), "caption")
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CaptionView { caption },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/ai/sentiment — classify the comments on a published post.
///
/// Comments are pulled from the aggregator across the post's sent targets,
/// then classified in one LLM call. A post with no fetched comments returns
/// a neutral verdict without spending an AI generation.
pub(in crate::api) async fn analyze_sentiment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<SentimentBody>,
) -> Result<Json<ApiResponse<SentimentView>>, ApiError> {
    let rid = &req_id.0;
    let Some(ai) = state.ai.clone() else {
        return Err(not_configured(rid, "AI sentiment analysis"));
    };
    let Some(social) = state.social.clone() else {
        return Err(not_configured(rid, "the social aggregator"));
    };

    let post = postdeck_db::get_post_by_public_id(&state.pool, user.id, body.post_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("no post {}", body.post_id)))?;

    let (_, _, _, caps) = user_capabilities(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !caps.can_generate_ai {
        return Err(plan_limit(rid, "monthly AI generation limit reached for the current plan"));
    }

    let targets = postdeck_db::list_targets_for_post(&state.pool, post.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let mut comments: Vec<String> = Vec::new();
    for target in targets.iter().filter(|t| t.status == "sent") {
        if let Some(filter) = body.platform.as_deref() {
            if target.platform != filter {
                continue;
            }
        }
        let (Some(profile_id), Some(external_post_id)) =
            (target.aggregator_profile_id.as_deref(), target.external_post_id.as_deref())
        else {
            continue;
        };
        let fetched = social
            .fetch_comments(profile_id, external_post_id, Some(target.platform.as_str()))
            .await
            .map_err(|e| map_social_error(rid, &e))?;
        comments.extend(fetched.into_iter().map(|c| c.text));
    }

    if comments.is_empty() {
        return Ok(Json(ApiResponse {
            data: SentimentView {
                label: SentimentLabel::Neutral,
                score: 0.0,
                comment_count: 0,
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let refs: Vec<&str> = comments.iter().map(String::as_str).collect();
    let response = ai
        .complete(SENTIMENT_SYSTEM, &sentiment_prompt(&refs))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "sentiment classification failed");
            ApiError::new(rid, "upstream_error", "sentiment classification failed")
        })?;
    let verdict = parse_sentiment(&response);

    postdeck_db::record_ai_usage(&state.pool, user.id, Some(post.brand_id), "sentiment")
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SentimentView {
            label: verdict.label,
            score: verdict.score,
            comment_count: comments.len(),
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
    use tower::ServiceExt;

    fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn caption_without_an_llm_client_is_service_unavailable(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "ai-unconfigured@test.example").await;
        seed_brand(&pool, uid, "ai-brand").await;
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(post_json(
                "/api/v1/ai/caption",
                &token,
                serde_json::json!({ "brand_slug": "ai-brand", "topic": "new roast" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["error"]["code"].as_str(), Some("not_configured"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn sentiment_requires_both_clients(pool: sqlx::PgPool) {
        let (uid, token) = seed_user_with_session(&pool, "ai-sentiment@test.example").await;
        let brand = seed_brand(&pool, uid, "sent-brand").await;
        let post = postdeck_db::create_post(
            &pool,
            brand.id,
            "opinions?",
            None,
            &serde_json::json!([]),
            &serde_json::json!([]),
        )
        .await
        .expect("post");
        let app = build_app(test_state(pool), default_rate_limit_state());

        let response = app
            .oneshot(post_json(
                "/api/v1/ai/sentiment",
                &token,
                serde_json::json!({ "post_id": post.public_id }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
