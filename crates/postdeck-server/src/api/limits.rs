//! Plan limits and current usage for the authenticated user.

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use postdeck_core::{Capabilities, PlanLimits, PlanTier, UsageCounts};

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, user_capabilities, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(in crate::api) struct LimitsView {
    pub tier: PlanTier,
    pub limits: PlanLimits,
    pub usage: UsageCounts,
    pub capabilities: Capabilities,
}

/// GET /api/v1/limits — the caps, the month-to-date usage, and the derived
/// "can I" flags in one payload, so clients never re-implement the cap math.
pub(in crate::api) async fn get_limits(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<LimitsView>>, ApiError> {
    let rid = &req_id.0;
    let (tier, limits, usage, capabilities) = user_capabilities(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: LimitsView {
            tier,
            limits,
            usage,
            capabilities,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
