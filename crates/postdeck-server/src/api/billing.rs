//! Subscription view, checkout initiation, and the payment-processor webhook.
//!
//! Local subscription state only mirrors what the processor reports through
//! signed webhooks; the checkout endpoint just hands the user a hosted URL.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use postdeck_billing::{verify_signature, WebhookEvent};
use postdeck_core::{PlanLimits, PlanTier};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    effective_plan, map_db_error, not_configured, ApiError, ApiResponse, AppState, ResponseMeta,
};

const SIGNATURE_HEADER: &str = "x-billing-signature";

// ---------------------------------------------------------------------------
// Subscription view
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(in crate::api) struct SubscriptionView {
    pub tier: PlanTier,
    pub status: String,
    pub limits: PlanLimits,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// GET /api/v1/billing/subscription — the user's effective plan. A user
/// without an active subscription reads as free tier rather than 404.
pub(in crate::api) async fn get_subscription(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<SubscriptionView>>, ApiError> {
    let rid = &req_id.0;
    let (tier, limits, subscription) = effective_plan(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let view = match subscription {
        Some(sub) => SubscriptionView {
            tier,
            status: sub.status,
            limits,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
        },
        None => SubscriptionView {
            tier,
            status: "none".to_owned(),
            limits,
            current_period_end: None,
            cancel_at_period_end: false,
        },
    };

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CheckoutBody {
    pub plan_tier: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct CheckoutView {
    pub checkout_url: String,
}

/// POST /api/v1/billing/checkout — start a hosted checkout for a paid tier.
pub(in crate::api) async fn create_checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<ApiResponse<CheckoutView>>, ApiError> {
    let rid = &req_id.0;
    let Some(billing) = state.billing.clone() else {
        return Err(not_configured(rid, "billing"));
    };

    let tier = PlanTier::parse(&body.plan_tier);
    if tier == PlanTier::Free || tier.as_str() != body.plan_tier.to_ascii_lowercase() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("'{}' is not a purchasable plan tier", body.plan_tier),
        ));
    }
    if postdeck_db::get_plan_by_tier(&state.pool, tier.as_str())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .is_none()
    {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("plan '{}' is not available", tier.as_str()),
        ));
    }

    // Coupons are validated up front so the user sees a clear error instead
    // of a silently full-price checkout; redemption is counted on activation.
    if let Some(code) = body.coupon_code.as_deref() {
        let coupon = postdeck_db::find_coupon_by_code(&state.pool, code)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
        match coupon {
            Some(c) if c.is_redeemable(Utc::now()) => {}
            _ => {
                return Err(ApiError::new(
                    rid,
                    "validation_error",
                    format!("coupon '{code}' is not valid"),
                ));
            }
        }
    }

    let checkout_url = billing
        .create_checkout(
            &user.public_id.to_string(),
            &user.email,
            tier.as_str(),
            body.coupon_code.as_deref(),
        )
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "checkout creation failed");
            ApiError::new(rid, "upstream_error", "checkout creation failed")
        })?;

    postdeck_db::insert_marketing_event(
        &state.pool,
        Some(user.id),
        "checkout_started",
        &serde_json::json!({
            "plan_tier": tier.as_str(),
            "coupon_code": body.coupon_code,
        }),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CheckoutView { checkout_url },
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(in crate::api) struct WebhookAck {
    pub received: bool,
    pub event: Option<String>,
}

/// POST /api/v1/billing/webhook — signed event delivery from the processor.
///
/// Unknown event types are acknowledged with 200 so the processor stops
/// retrying them; signature failures are rejected so a retry can follow a
/// secret rotation.
pub(in crate::api) async fn webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    let rid = &req_id.0;
    let Some(secret) = state.config.billing_webhook_secret.as_deref() else {
        return Err(not_configured(rid, "the billing webhook"));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::new(rid, "unauthorized", "missing webhook signature"))?;
    if !verify_signature(secret, &body, signature) {
        tracing::warn!("billing webhook signature verification failed");
        return Err(ApiError::new(rid, "forbidden", "invalid webhook signature"));
    }

    let event = match WebhookEvent::parse(&body) {
        Ok(event) => event,
        Err(postdeck_billing::BillingError::UnknownEvent(kind)) => {
            tracing::info!(event = %kind, "acknowledging unhandled billing event");
            return Ok(Json(ApiResponse {
                data: WebhookAck {
                    received: true,
                    event: None,
                },
                meta: ResponseMeta::new(req_id.0),
            }));
        }
        Err(e) => {
            tracing::warn!(error = %e, "billing webhook payload rejected");
            return Err(ApiError::new(rid, "bad_request", "malformed webhook payload"));
        }
    };

    let kind = event.kind();
    match &event {
        WebhookEvent::SubscriptionActivated(sub) => {
            apply_subscription_state(&state, sub, "active", false, rid).await?;
            redeem_coupon(&state, sub.coupon_code.as_deref()).await;
        }
        WebhookEvent::SubscriptionRenewed(sub) => {
            apply_subscription_state(&state, sub, "active", false, rid).await?;
        }
        WebhookEvent::SubscriptionCancelled(sub) => {
            apply_subscription_state(&state, sub, "cancelled", true, rid).await?;
        }
        WebhookEvent::PaymentSucceeded(payment) => {
            record_payment(&state, payment, "succeeded", rid).await?;
        }
        WebhookEvent::PaymentFailed(payment) => {
            record_payment(&state, payment, "failed", rid).await?;
        }
    }

    tracing::info!(event = kind, "billing webhook processed");
    Ok(Json(ApiResponse {
        data: WebhookAck {
            received: true,
            event: Some(kind.to_owned()),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Mirrors a `subscription.*` event into the local subscriptions table.
///
/// The user is resolved from the public id echoed through checkout metadata,
/// falling back to the existing subscription row for renewals that omit it.
async fn apply_subscription_state(
    state: &AppState,
    event: &postdeck_billing::SubscriptionEvent,
    status: &str,
    cancel_at_period_end: bool,
    rid: &str,
) -> Result<(), ApiError> {
    let existing =
        postdeck_db::get_subscription_by_external_id(&state.pool, &event.external_subscription_id)
            .await
            .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let user_id = match event
        .user_public_id
        .as_deref()
        .and_then(|v| Uuid::parse_str(v).ok())
    {
        Some(public_id) => postdeck_db::get_user_by_public_id(&state.pool, public_id)
            .await
            .map_err(|e| map_db_error(rid.to_owned(), &e))?
            .map(|u| u.id),
        None => existing.as_ref().map(|sub| sub.user_id),
    };
    let Some(user_id) = user_id else {
        tracing::warn!(
            external_subscription_id = %event.external_subscription_id,
            "subscription event references no known user; acknowledging without applying"
        );
        return Ok(());
    };

    let tier = event
        .plan_tier
        .as_deref()
        .map(PlanTier::parse)
        .unwrap_or(PlanTier::Free);
    let plan_id = match postdeck_db::get_plan_by_tier(&state.pool, tier.as_str())
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
    {
        Some(plan) => plan.id,
        None => match existing.as_ref() {
            Some(sub) => sub.plan_id,
            None => {
                tracing::warn!(
                    tier = tier.as_str(),
                    "subscription event references an unseeded plan; acknowledging without applying"
                );
                return Ok(());
            }
        },
    };

    postdeck_db::upsert_subscription_from_webhook(
        &state.pool,
        user_id,
        plan_id,
        &event.external_subscription_id,
        status,
        event.period_start,
        event.period_end,
        cancel_at_period_end,
    )
    .await
    .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    Ok(())
}

/// Counts a coupon redemption once the processor confirms the activation.
/// Failures are logged only; the subscription state is already applied.
async fn redeem_coupon(state: &AppState, code: Option<&str>) {
    let Some(code) = code else {
        return;
    };
    match postdeck_db::find_coupon_by_code(&state.pool, code).await {
        Ok(Some(coupon)) => {
            match postdeck_db::apply_coupon_redemption(&state.pool, coupon.id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(coupon = code, "coupon redeemed past its redemption cap");
                }
                Err(e) => {
                    tracing::warn!(error = %e, coupon = code, "failed to count coupon redemption");
                }
            }
        }
        Ok(None) => tracing::warn!(coupon = code, "activation references an unknown coupon"),
        Err(e) => tracing::warn!(error = %e, coupon = code, "coupon lookup failed"),
    }
}

/// Appends a `payment.*` event to billing history, tied to the subscription
/// when the processor includes one.
async fn record_payment(
    state: &AppState,
    event: &postdeck_billing::PaymentEvent,
    status: &str,
    rid: &str,
) -> Result<(), ApiError> {
    let subscription = match event.external_subscription_id.as_deref() {
        Some(external_id) => postdeck_db::get_subscription_by_external_id(&state.pool, external_id)
            .await
            .map_err(|e| map_db_error(rid.to_owned(), &e))?,
        None => None,
    };
    let Some(subscription) = subscription else {
        tracing::warn!(
            external_subscription_id = event.external_subscription_id.as_deref().unwrap_or("none"),
            "payment event references no known subscription; acknowledging without recording"
        );
        return Ok(());
    };

    postdeck_db::append_billing_history(
        &state.pool,
        subscription.user_id,
        Some(subscription.id),
        event.external_subscription_id.as_deref(),
        event.amount,
        &event.currency,
        status,
        Utc::now(),
    )
    .await
    .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    Ok(())
}
