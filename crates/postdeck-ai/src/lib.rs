//! LLM integration: caption drafting and comment sentiment.
//!
//! Wraps an OpenAI-compatible chat-completions endpoint. Prompt construction
//! lives in [`prompts`]; the HTTP plumbing in [`client`].

mod client;
mod error;
pub mod prompts;

pub use client::LlmClient;
pub use error::LlmError;
pub use prompts::{CaptionRequest, SentimentLabel, SentimentVerdict};
