use serde::{Deserialize, Serialize};

use crate::domain::{ChatTurn, CustomerId, Notice, Page, SessionId};

/// Buttons that move between pages without touching persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavAction {
    RaiseNewIssue,
    ViewExistingIssues,
    Home,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub action: NavAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateIssueRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub issue: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetIssueRequest {
    pub issue: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub rows_affected: u64,
}

/// Page payload rendered for the session's current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum PageView {
    Home,
    NewIssue,
    IssueManagement {
        customer_id: CustomerId,
        transcript: Vec<ChatTurn>,
    },
    ExistingIssue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_issue: Option<String>,
    },
}

impl PageView {
    pub fn page(&self) -> Page {
        match self {
            PageView::Home => Page::Home,
            PageView::NewIssue => Page::NewIssue,
            PageView::IssueManagement { .. } => Page::IssueManagement,
            PageView::ExistingIssue { .. } => Page::ExistingIssue,
        }
    }
}

/// Result of one user action: where the session ended up and what to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub view: PageView,
    #[serde(default)]
    pub notices: Vec<Notice>,
}

impl Interaction {
    pub fn page(&self) -> Page {
        self.view.page()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub interaction: Interaction,
}
