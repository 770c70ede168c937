//! Typed client for the social-posting aggregator API.
//!
//! The aggregator owns the platform-side OAuth flows and posting mechanics;
//! postdeck talks to it for profile management, account linking, comment
//! fetching, and publishing.

mod client;
mod error;
mod retry;
mod types;

pub use client::SocialApiClient;
pub use error::SocialApiError;
pub use types::{
    CommentItem, LinkUrl, PublishOutcome, PublishRequest, RemoteAccount, RemoteProfile,
};
