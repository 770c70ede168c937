//! Wire types for the aggregator API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An aggregator profile (one per brand).
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProfile {
    pub id: String,
    pub name: String,
}

/// One connected platform identity as the aggregator reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAccount {
    pub id: String,
    pub platform: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Platform-specific quirks the aggregator passes through untouched.
    #[serde(default)]
    pub metadata: Value,
}

/// The hosted OAuth linking URL for a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkUrl {
    pub url: String,
}

/// One comment on a published post.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentItem {
    pub id: String,
    pub platform: String,
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// A publish request for one profile.
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    pub body: String,
    pub platforms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
}

/// Per-platform outcome of a publish call.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishOutcome {
    pub platform: String,
    pub success: bool,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// Response envelopes. Every aggregator endpoint wraps its payload with a
// top-level "status" field; error envelopes are handled before these parse.

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResponse {
    pub profile: RemoteProfile,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountsResponse {
    pub accounts: Vec<RemoteAccount>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LinkResponse {
    pub link: LinkUrl,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentsResponse {
    pub comments: Vec<CommentItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublishResponse {
    pub results: Vec<PublishOutcome>,
}
