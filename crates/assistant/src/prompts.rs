use tracing::warn;

use crate::{AssistantError, CompletionClient, CompletionRequest};

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a highly skilled professional assistant. \
Summarize the text provided by the customer into a single, well-structured paragraph using a \
formal and professional tone. Focus only on the relevant and key details expressed by the \
customer, avoiding any unrelated or irrelevant points. Ensure the summary is clear, concise, and \
accurately reflects the customer's main concerns or intentions. Use third-person perspective and \
avoid including any first-person pronouns such as 'my' or 'I'. Do not include any introductory \
or concluding phrases such as 'Here is a summary.' Return only the main summarized content.";

pub const REPLY_SYSTEM_PROMPT: &str = "you are a helpful assistant for an e-commerce company. \
Give a meaningful response within 150 tokens";

pub fn summary_request(transcript: &str) -> CompletionRequest {
    CompletionRequest {
        system_prompt: SUMMARY_SYSTEM_PROMPT.to_string(),
        user_message: transcript.to_string(),
        temperature: 0.5,
        max_tokens: 400,
        top_p: 1.0,
    }
}

pub fn reply_request(utterance: &str) -> CompletionRequest {
    CompletionRequest {
        system_prompt: REPLY_SYSTEM_PROMPT.to_string(),
        user_message: utterance.to_string(),
        temperature: 0.5,
        max_tokens: 100,
        top_p: 1.0,
    }
}

/// Summarizes customer-authored text. Never fails: every error becomes the text that gets
/// persisted in place of a summary.
pub async fn summarize_transcript(client: &dyn CompletionClient, transcript: &str) -> String {
    match client.complete(summary_request(transcript)).await {
        Ok(summary) => summary,
        Err(err) => {
            warn!(retryable = err.is_retryable(), error = %err, "transcript summary failed");
            match err {
                AssistantError::Status { .. } => format!("API Error: {err}"),
                AssistantError::MissingContent => {
                    "Error: No summary returned in response.".to_string()
                }
                AssistantError::Transport(_) | AssistantError::Decode(_) => {
                    format!("Error summarizing the transcript: {err}")
                }
            }
        }
    }
}

/// Answers one utterance with no prior context. Failures come back as `Error: ...` text.
pub async fn reply_to_customer(client: &dyn CompletionClient, utterance: &str) -> String {
    match client.complete(reply_request(utterance)).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(retryable = err.is_retryable(), error = %err, "assistant reply failed");
            format!("Error: {err}")
        }
    }
}
