//! Payment processor integration: checkout, cancellation, and signed
//! webhook ingestion.

mod client;
mod error;
mod webhook;

pub use client::BillingClient;
pub use error::BillingError;
pub use webhook::{verify_signature, PaymentEvent, SubscriptionEvent, WebhookEvent};
