//! Aggregator OAuth redirect target.
//!
//! The hosted linking flow sends the user's browser back here with the brand
//! id and outcome in the query string. The upstream occasionally chains a
//! second query string with `?` instead of `&` (e.g.
//! `...?brandId=X&status=success?accountId=Y`), so standard query parsing is
//! backed by a regex pass over the percent-decoded raw query.

use std::collections::HashMap;

use axum::{
    extract::{RawQuery, State},
    Extension, Json,
};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::accounts::sync_brand_accounts;
use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(in crate::api) struct CallbackOutcome {
    pub status: &'static str,
    pub brand_slug: Option<String>,
    pub synced: Option<usize>,
    pub message: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    brand_id: Option<String>,
    status: Option<String>,
    error: Option<String>,
    account_id: Option<String>,
}

/// Parses the callback query, tolerating the chained-`?` upstream bug.
fn parse_callback_query(raw: &str) -> CallbackParams {
    let mut pairs: HashMap<String, String> = HashMap::new();
    for pair in raw.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            let value = percent_decode_str(value).decode_utf8_lossy().into_owned();
            pairs.entry(key.to_owned()).or_insert(value);
        }
    }

    let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();
    let fallback = |key: &str| -> Option<String> {
        // Regex pass catches keys hidden behind a second '?'.
        let re = Regex::new(&format!(r"(?:^|[&?]){key}=([^&?]+)")).ok()?;
        re.captures(&decoded).map(|c| c[1].to_owned())
    };

    let clean = |key: &str| -> Option<String> {
        match pairs.get(key) {
            // A '?' inside the value means the chained query string got glued
            // onto it; the regex pass extracts the clean value.
            Some(v) if !v.contains('?') => Some(v.clone()),
            _ => fallback(key),
        }
    };

    CallbackParams {
        brand_id: clean("brandId"),
        status: clean("status"),
        error: clean("error"),
        account_id: clean("accountId"),
    }
}

/// GET /api/v1/oauth/callback — aggregator redirect target (no session).
///
/// On a successful link, runs a fresh-reconnect sync for the brand so the new
/// account appears immediately and any manual-disconnect flag on it clears.
pub(in crate::api) async fn callback(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    RawQuery(raw): RawQuery,
) -> Result<Json<ApiResponse<CallbackOutcome>>, ApiError> {
    let rid = &req_id.0;
    let params = parse_callback_query(raw.as_deref().unwrap_or(""));

    let brand_public_id = params
        .brand_id
        .as_deref()
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| {
            ApiError::new(rid, "validation_error", "missing or malformed brandId parameter")
        })?;

    let brand = postdeck_db::get_brand_by_public_id(&state.pool, brand_public_id)
        .await
        .map_err(|e| super::map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "unknown brand"))?;

    let failed = params.status.as_deref() == Some("error") || params.error.is_some();
    if failed {
        let message = params.error.unwrap_or_else(|| "linking failed".to_owned());
        tracing::warn!(brand_id = brand.id, message = %message, "oauth callback reported a failure");
        return Ok(Json(ApiResponse {
            data: CallbackOutcome {
                status: "error",
                brand_slug: Some(brand.slug),
                synced: None,
                message: Some(message),
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    tracing::info!(
        brand_id = brand.id,
        account_id = params.account_id.as_deref().unwrap_or("unknown"),
        "oauth callback succeeded, running fresh-reconnect sync"
    );

    let synced = sync_brand_accounts(&state, &brand, true, rid).await?;

    Ok(Json(ApiResponse {
        data: CallbackOutcome {
            status: "ok",
            brand_slug: Some(brand.slug),
            synced: Some(synced),
            message: None,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
