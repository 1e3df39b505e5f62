//! Per-session page state. Every transition goes through [`SessionContext::apply`], whose match is
//! the complete table of allowed moves; anything not listed is rejected.

use shared::{
    domain::{ChatRole, ChatTurn, CustomerId, Notice, Page},
    protocol::NavAction,
};
use thiserror::Error;

pub const NO_CUSTOMER_SELECTED: &str = "No customer selected. Please add a customer first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    Navigate(NavAction),
    IntakeAccepted(CustomerId),
    Escalated,
}

impl PageEvent {
    pub fn name(self) -> &'static str {
        match self {
            PageEvent::Navigate(NavAction::RaiseNewIssue) => "raise_new_issue",
            PageEvent::Navigate(NavAction::ViewExistingIssues) => "view_existing_issues",
            PageEvent::Navigate(NavAction::Home) => "home",
            PageEvent::IntakeAccepted(_) => "intake_accepted",
            PageEvent::Escalated => "escalate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("'{event}' is not available on the {from} page")]
    NotAllowed { from: Page, event: &'static str },
}

/// Everything one browser session remembers between interactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    page: Page,
    customer_id: Option<CustomerId>,
    transcript: Vec<ChatTurn>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn at_page(page: Page) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn apply(&mut self, event: PageEvent) -> Result<Page, TransitionError> {
        use NavAction::{Home, RaiseNewIssue, ViewExistingIssues};

        let next = match (self.page, event) {
            (Page::Home, PageEvent::Navigate(RaiseNewIssue)) => Page::NewIssue,
            (Page::Home, PageEvent::Navigate(ViewExistingIssues)) => Page::ExistingIssue,
            (Page::NewIssue, PageEvent::IntakeAccepted(customer_id)) => {
                self.customer_id = Some(customer_id);
                self.transcript.clear();
                Page::IssueManagement
            }
            (Page::NewIssue, PageEvent::Navigate(Home)) => Page::Home,
            (Page::IssueManagement, PageEvent::Escalated) => {
                self.clear_chat();
                Page::NewIssue
            }
            // Leaving the chat for home also drops the customer and transcript, same as escalation.
            (Page::IssueManagement, PageEvent::Navigate(Home)) => {
                self.clear_chat();
                Page::Home
            }
            (Page::ExistingIssue, PageEvent::Navigate(Home)) => Page::Home,
            (from, event) => {
                return Err(TransitionError::NotAllowed {
                    from,
                    event: event.name(),
                })
            }
        };
        self.page = next;
        Ok(next)
    }

    /// Fails closed: a chat page without an active customer is sent back to intake.
    pub fn enforce_chat_guard(&mut self) -> Option<Notice> {
        if self.page == Page::IssueManagement && self.customer_id.is_none() {
            self.page = Page::NewIssue;
            self.transcript.clear();
            return Some(Notice::error(NO_CUSTOMER_SELECTED));
        }
        None
    }

    pub fn push_turn(&mut self, turn: ChatTurn) {
        self.transcript.push(turn);
    }

    /// Customer-authored turns joined by single spaces; assistant turns are left out.
    pub fn customer_text(&self) -> String {
        self.transcript
            .iter()
            .filter(|turn| turn.role == ChatRole::Customer)
            .map(|turn| turn.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn clear_chat(&mut self) {
        self.customer_id = None;
        self.transcript.clear();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
