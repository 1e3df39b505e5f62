//! Remote chat-completion calls used by the support flow: one client seam, two fixed-prompt
//! operations (transcript summarization and single-turn replies).

use async_trait::async_trait;
use thiserror::Error;

mod http;
mod prompts;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use http::{ChatCompletionsClient, ChatCompletionsConfig, DEFAULT_API_URL, DEFAULT_MODEL};
pub use prompts::{
    reply_request, reply_to_customer, summarize_transcript, summary_request, REPLY_SYSTEM_PROMPT,
    SUMMARY_SYSTEM_PROMPT,
};

/// One stateless completion: a system prompt, the latest user text, and sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("{status} - {body}")]
    Status { status: u16, body: String },
    #[error("no content returned in response")]
    MissingContent,
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl AssistantError {
    /// Transport failures and throttling/server statuses may succeed on a later attempt;
    /// malformed or rejected requests will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AssistantError::Transport(err) => !err.is_builder() && !err.is_decode(),
            AssistantError::Status { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            }
            AssistantError::MissingContent | AssistantError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AssistantError::Decode(err.to_string())
        } else {
            AssistantError::Transport(err)
        }
    }
}

/// Each call is independent; no conversation context is carried between calls.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AssistantError>;
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
