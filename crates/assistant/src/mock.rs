use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use crate::{AssistantError, CompletionClient, CompletionRequest};

/// Replays canned outcomes in order and records every request it receives.
/// Once the script runs out, it echoes the user message back.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, AssistantError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(script: impl IntoIterator<Item = Result<String, AssistantError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|reply| Ok(reply.to_string())))
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AssistantError> {
        let echo = request.user_message.clone();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        next.unwrap_or(Ok(echo))
    }
}
