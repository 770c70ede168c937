//! HTTP client for the social-posting aggregator REST API.
//!
//! Wraps `reqwest` with aggregator-specific error handling, Bearer key
//! management, and typed response deserialization. All endpoints check the
//! `"status"` field in the JSON envelope and surface API-level errors as
//! [`SocialApiError::Api`]; transient failures are retried with back-off.

use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde::Serialize;

use crate::error::SocialApiError;
use crate::retry::retry_with_backoff;
use crate::types::{
    AccountsResponse, CommentItem, CommentsResponse, LinkResponse, LinkUrl, ProfileResponse,
    PublishOutcome, PublishRequest, PublishResponse, RemoteAccount, RemoteProfile,
};

const DEFAULT_BASE_URL: &str = "https://api.postbridge.example/";
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Client for the aggregator REST API.
///
/// Manages the HTTP client, API key, and base URL. Use [`SocialApiClient::new`]
/// for production or [`SocialApiClient::with_base_url`] to point at a mock
/// server in tests.
pub struct SocialApiClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl SocialApiClient {
    /// Creates a new client pointed at the production aggregator API.
    ///
    /// # Errors
    ///
    /// Returns [`SocialApiError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64, max_retries: u32) -> Result<Self, SocialApiError> {
        Self::with_base_url(api_key, timeout_secs, max_retries, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SocialApiError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SocialApiError::Api`] if `base_url` is not
    /// a valid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        base_url: &str,
    ) -> Result<Self, SocialApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("postdeck/0.1 (social-scheduling)")
            .build()?;

        // Normalise: exactly one trailing slash so Url::join appends path
        // segments instead of replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| SocialApiError::Api(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            max_retries,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the back-off base delay. Tests use `0` to avoid sleeping.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Creates an aggregator profile. One profile backs one brand; connected
    /// platform accounts hang off it.
    ///
    /// # Errors
    ///
    /// - [`SocialApiError::Api`] if the aggregator rejects the request.
    /// - [`SocialApiError::Http`] on network failure or non-2xx HTTP status
    ///   after retries are exhausted.
    /// - [`SocialApiError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn create_profile(&self, name: &str) -> Result<RemoteProfile, SocialApiError> {
        let url = self.build_url("v1/profiles")?;
        let payload = serde_json::json!({ "name": name });
        let body = self.request_json(Method::POST, &url, Some(&payload)).await?;
        Self::check_api_error(&body)?;

        let envelope: ProfileResponse =
            serde_json::from_value(body).map_err(|e| SocialApiError::Deserialize {
                context: format!("create_profile(name={name})"),
                source: e,
            })?;

        Ok(envelope.profile)
    }

    /// Deletes an aggregator profile and all its platform links.
    ///
    /// # Errors
    ///
    /// - [`SocialApiError::Api`] if the aggregator rejects the request.
    /// - [`SocialApiError::Http`] on network failure or non-2xx HTTP status
    ///   after retries are exhausted.
    pub async fn delete_profile(&self, profile_id: &str) -> Result<(), SocialApiError> {
        let url = self.build_url(&format!("v1/profiles/{profile_id}"))?;
        let body = self.request_json(Method::DELETE, &url, None::<&()>).await?;
        Self::check_api_error(&body)?;
        Ok(())
    }

    /// Lists the platform accounts currently linked to a profile.
    ///
    /// # Errors
    ///
    /// - [`SocialApiError::Api`] if the aggregator rejects the request.
    /// - [`SocialApiError::Http`] on network failure or non-2xx HTTP status
    ///   after retries are exhausted.
    /// - [`SocialApiError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn list_accounts(
        &self,
        profile_id: &str,
    ) -> Result<Vec<RemoteAccount>, SocialApiError> {
        let url = self.build_url(&format!("v1/profiles/{profile_id}/accounts"))?;
        let body = self.request_json(Method::GET, &url, None::<&()>).await?;
        Self::check_api_error(&body)?;

        let envelope: AccountsResponse =
            serde_json::from_value(body).map_err(|e| SocialApiError::Deserialize {
                context: format!("list_accounts(profile={profile_id})"),
                source: e,
            })?;

        Ok(envelope.accounts)
    }

    /// Generates a hosted OAuth linking URL for a profile. The aggregator
    /// redirects the user back to `redirect_url` after the platform flow.
    ///
    /// # Errors
    ///
    /// - [`SocialApiError::Api`] if the aggregator rejects the request.
    /// - [`SocialApiError::Http`] on network failure or non-2xx HTTP status
    ///   after retries are exhausted.
    /// - [`SocialApiError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn generate_link_url(
        &self,
        profile_id: &str,
        redirect_url: &str,
    ) -> Result<LinkUrl, SocialApiError> {
        let url = self.build_url(&format!("v1/profiles/{profile_id}/link"))?;
        let payload = serde_json::json!({ "redirect_url": redirect_url });
        let body = self.request_json(Method::POST, &url, Some(&payload)).await?;
        Self::check_api_error(&body)?;

        let envelope: LinkResponse =
            serde_json::from_value(body).map_err(|e| SocialApiError::Deserialize {
                context: format!("generate_link_url(profile={profile_id})"),
                source: e,
            })?;

        Ok(envelope.link)
    }

    /// Fetches the comments on a published post, optionally filtered to one
    /// platform.
    ///
    /// # Errors
    ///
    /// - [`SocialApiError::Api`] if the aggregator rejects the request.
    /// - [`SocialApiError::Http`] on network failure or non-2xx HTTP status
    ///   after retries are exhausted.
    /// - [`SocialApiError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn fetch_comments(
        &self,
        profile_id: &str,
        external_post_id: &str,
        platform: Option<&str>,
    ) -> Result<Vec<CommentItem>, SocialApiError> {
        let mut url =
            self.build_url(&format!("v1/profiles/{profile_id}/posts/{external_post_id}/comments"))?;
        if let Some(p) = platform {
            url.query_pairs_mut().append_pair("platform", p);
        }
        let body = self.request_json(Method::GET, &url, None::<&()>).await?;
        Self::check_api_error(&body)?;

        let envelope: CommentsResponse =
            serde_json::from_value(body).map_err(|e| SocialApiError::Deserialize {
                context: format!("fetch_comments(post={external_post_id})"),
                source: e,
            })?;

        Ok(envelope.comments)
    }

    /// Publishes a post through a profile to the requested platforms.
    ///
    /// The aggregator reports one outcome per platform; a partial failure is
    /// not an error at this layer, callers inspect the outcomes.
    ///
    /// # Errors
    ///
    /// - [`SocialApiError::Api`] if the aggregator rejects the request as a
    ///   whole (bad profile, bad payload).
    /// - [`SocialApiError::Http`] on network failure or non-2xx HTTP status
    ///   after retries are exhausted.
    /// - [`SocialApiError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn publish_post(
        &self,
        profile_id: &str,
        request: &PublishRequest,
    ) -> Result<Vec<PublishOutcome>, SocialApiError> {
        let url = self.build_url(&format!("v1/profiles/{profile_id}/posts"))?;
        let body = self.request_json(Method::POST, &url, Some(request)).await?;
        Self::check_api_error(&body)?;

        let envelope: PublishResponse =
            serde_json::from_value(body).map_err(|e| SocialApiError::Deserialize {
                context: format!("publish_post(profile={profile_id})"),
                source: e,
            })?;

        Ok(envelope.results)
    }

    fn build_url(&self, path: &str) -> Result<Url, SocialApiError> {
        self.base_url
            .join(path)
            .map_err(|e| SocialApiError::Api(format!("invalid URL path '{path}': {e}")))
    }

    /// Sends a request with retries, asserts a 2xx HTTP status, and parses the
    /// response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SocialApiError::Http`] on network failure or a non-2xx status
    /// once retries are exhausted. Returns [`SocialApiError::Deserialize`] if
    /// the body is not valid JSON.
    async fn request_json<B: Serialize>(
        &self,
        method: Method,
        url: &Url,
        json_body: Option<&B>,
    ) -> Result<serde_json::Value, SocialApiError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async {
            let mut req = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(&self.api_key);
            if let Some(payload) = json_body {
                req = req.json(payload);
            }
            let response = req.send().await?;
            let response = response.error_for_status()?;
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| SocialApiError::Deserialize {
                context: url.to_string(),
                source: e,
            })
        })
        .await
    }

    /// Checks the top-level `"status"` field and returns an error if it
    /// indicates failure.
    fn check_api_error(body: &serde_json::Value) -> Result<(), SocialApiError> {
        if body.get("status").and_then(serde_json::Value::as_str) == Some("error") {
            let msg = body
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(SocialApiError::Api(msg));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> SocialApiClient {
        SocialApiClient::with_base_url("test-key", 30, 0, base_url)
            .expect("client construction should not fail")
    }

    #[test]
    fn build_url_joins_path_segments() {
        let client = test_client("https://api.postbridge.example");
        let url = client.build_url("v1/profiles/pf_1/accounts").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.postbridge.example/v1/profiles/pf_1/accounts"
        );
    }

    #[test]
    fn build_url_normalises_trailing_slash() {
        let client = test_client("https://api.postbridge.example///");
        let url = client.build_url("v1/profiles").unwrap();
        assert_eq!(url.as_str(), "https://api.postbridge.example/v1/profiles");
    }

    #[test]
    fn error_envelope_surfaces_message() {
        let body = serde_json::json!({ "status": "error", "message": "profile not found" });
        let err = SocialApiClient::check_api_error(&body).unwrap_err();
        assert!(matches!(err, SocialApiError::Api(m) if m == "profile not found"));
    }

    #[test]
    fn ok_envelope_passes_through() {
        let body = serde_json::json!({ "status": "ok", "profile": { "id": "pf_1", "name": "x" } });
        assert!(SocialApiClient::check_api_error(&body).is_ok());
    }
}
