//! Webhook signature verification and event parsing.
//!
//! The processor signs each delivery with `hex(SHA-256(secret || raw_body))`
//! in the `x-billing-signature` header. Verification decodes the header and
//! compares digests in constant time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::BillingError;

/// Verifies a webhook delivery signature against the shared secret.
///
/// Returns `false` for a malformed (non-hex, wrong-length) signature as well
/// as for a digest mismatch.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body);
    let expected = hasher.finalize();
    if provided.len() != expected.len() {
        return false;
    }
    expected.as_slice().ct_eq(&provided).into()
}

/// Subscription lifecycle payload shared by the `subscription.*` events.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionEvent {
    pub external_subscription_id: String,
    /// The user's public id, echoed back from checkout metadata.
    pub user_public_id: Option<String>,
    pub plan_tier: Option<String>,
    /// Coupon applied at checkout, echoed back on activation.
    pub coupon_code: Option<String>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

/// Payment payload shared by the `payment.*` events.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub external_subscription_id: Option<String>,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub description: Option<String>,
}

fn default_currency() -> String {
    "USD".to_owned()
}

/// A parsed webhook event.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    SubscriptionActivated(SubscriptionEvent),
    SubscriptionRenewed(SubscriptionEvent),
    SubscriptionCancelled(SubscriptionEvent),
    PaymentSucceeded(PaymentEvent),
    PaymentFailed(PaymentEvent),
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Value,
}

impl WebhookEvent {
    /// Parses a raw webhook body into a typed event.
    ///
    /// # Errors
    ///
    /// - [`BillingError::Payload`] if the body is not valid JSON or the data
    ///   block does not match the event type's shape.
    /// - [`BillingError::UnknownEvent`] for event types this service does not
    ///   handle; callers acknowledge these without acting on them.
    pub fn parse(body: &[u8]) -> Result<Self, BillingError> {
        let raw: RawEvent = serde_json::from_slice(body)?;
        match raw.event_type.as_str() {
            "subscription.activated" => {
                Ok(Self::SubscriptionActivated(serde_json::from_value(raw.data)?))
            }
            "subscription.renewed" => {
                Ok(Self::SubscriptionRenewed(serde_json::from_value(raw.data)?))
            }
            "subscription.cancelled" => {
                Ok(Self::SubscriptionCancelled(serde_json::from_value(raw.data)?))
            }
            "payment.succeeded" => Ok(Self::PaymentSucceeded(serde_json::from_value(raw.data)?)),
            "payment.failed" => Ok(Self::PaymentFailed(serde_json::from_value(raw.data)?)),
            other => Err(BillingError::UnknownEvent(other.to_owned())),
        }
    }

    /// The event's wire name, for logging and billing-history rows.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SubscriptionActivated(_) => "subscription.activated",
            Self::SubscriptionRenewed(_) => "subscription.renewed",
            Self::SubscriptionCancelled(_) => "subscription.cancelled",
            Self::PaymentSucceeded(_) => "payment.succeeded",
            Self::PaymentFailed(_) => "payment.failed",
        }
    }
}
