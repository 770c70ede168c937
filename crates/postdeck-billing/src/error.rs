use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("billing API error: {0}")]
    Api(String),

    #[error("unrecognized webhook event type: {0}")]
    UnknownEvent(String),

    #[error("webhook payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
