//! HTTP client for the payment processor's checkout API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BillingError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the payment processor REST API.
pub struct BillingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct CheckoutRequest<'a> {
    user_public_id: &'a str,
    user_email: &'a str,
    plan_tier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_code: Option<&'a str>,
}

#[derive(Deserialize)]
struct CheckoutResponse {
    checkout_url: String,
}

impl BillingClient {
    /// Creates a client for the processor at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    /// Creates a hosted checkout session and returns its URL.
    ///
    /// The user's public id rides along as metadata so the processor can echo
    /// it back in subscription webhooks.
    ///
    /// # Errors
    ///
    /// - [`BillingError::Http`] on network failure.
    /// - [`BillingError::Api`] on a non-2xx response or an unparseable body.
    pub async fn create_checkout(
        &self,
        user_public_id: &str,
        user_email: &str,
        plan_tier: &str,
        coupon_code: Option<&str>,
    ) -> Result<String, BillingError> {
        let request = CheckoutRequest {
            user_public_id,
            user_email,
            plan_tier,
            coupon_code,
        };
        let response = self
            .client
            .post(format!("{}/v1/checkout", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Api(format!("status {status}: {body}")));
        }

        let parsed: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Api(format!("checkout response parse error: {e}")))?;
        Ok(parsed.checkout_url)
    }

    /// Cancels a subscription at the processor. The authoritative state change
    /// still arrives via the `subscription.cancelled` webhook.
    ///
    /// # Errors
    ///
    /// - [`BillingError::Http`] on network failure.
    /// - [`BillingError::Api`] on a non-2xx response.
    pub async fn cancel_subscription(
        &self,
        external_subscription_id: &str,
    ) -> Result<(), BillingError> {
        let response = self
            .client
            .delete(format!(
                "{}/v1/subscriptions/{external_subscription_id}",
                self.base_url
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Api(format!("status {status}: {body}")));
        }
        Ok(())
    }
}
