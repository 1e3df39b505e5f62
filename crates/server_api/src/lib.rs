use std::sync::Arc;

use assistant::{reply_to_customer, summarize_transcript, CompletionClient};
use shared::{
    domain::{ChatTurn, CustomerContact, CustomerId, CustomerIssue, Notice, Page},
    error::{ApiError, ErrorCode},
    protocol::{Interaction, MutationResponse, NavAction, PageView, UpdateIssueRequest},
    validation::validate_contact,
};
use storage::{is_unique_violation, Storage};
use tracing::{error, info, warn};

pub mod session;

pub use session::{PageEvent, SessionContext, TransitionError};

pub const DUPLICATE_CONTACT: &str = "Email or Phone already exists. Please use unique values.";
pub const ESCALATION_SAVED: &str = "Your chat history has been saved for further review.";
pub const BLANK_PHONE: &str = "Please enter a valid phone number.";
pub const NO_PREVIOUS_ISSUE: &str = "No previous issue found for the provided phone number.";
pub const NO_ISSUE_RECORDED: &str = "No issue has been recorded for this phone number yet.";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub assistant: Arc<dyn CompletionClient>,
}

impl ApiContext {
    pub fn new(storage: Storage, assistant: Arc<dyn CompletionClient>) -> Self {
        Self { storage, assistant }
    }
}

/// Draws the current page, redirecting a customer-less chat page back to intake.
pub fn render(session: &mut SessionContext) -> Interaction {
    let notices = session.enforce_chat_guard().into_iter().collect();
    Interaction {
        view: view_for(session, None),
        notices,
    }
}

pub fn navigate(session: &mut SessionContext, action: NavAction) -> Result<Interaction, ApiError> {
    let page = session
        .apply(PageEvent::Navigate(action))
        .map_err(transition)?;
    let mut interaction = render(session);
    interaction.notices.insert(
        0,
        Notice::success(format!("Navigating to '{}' page...", page.title())),
    );
    Ok(interaction)
}

/// New-issue form submit: validate, create the record, and open the chat for it.
pub async fn submit_intake(
    ctx: &ApiContext,
    session: &mut SessionContext,
    form: &CustomerContact,
) -> Result<Interaction, ApiError> {
    ensure_page(session, Page::NewIssue, "submit_intake")?;
    let contact =
        validate_contact(form).map_err(|e| ApiError::new(ErrorCode::Validation, e.to_string()))?;

    let customer_id = ctx.storage.create_record(&contact).await.map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::new(ErrorCode::Conflict, DUPLICATE_CONTACT)
        } else {
            let cause = format!("{err:#}");
            error!(error = %cause, "intake insert failed");
            ApiError::new(ErrorCode::Internal, format!("Unexpected error: {cause}"))
        }
    })?;

    session
        .apply(PageEvent::IntakeAccepted(customer_id))
        .map_err(transition)?;
    info!(customer_id = customer_id.0, "intake accepted");
    Ok(render(session))
}

/// Appends the customer's message and the assistant's single-turn reply. Blank input is ignored.
pub async fn send_chat_message(
    ctx: &ApiContext,
    session: &mut SessionContext,
    message: &str,
) -> Result<Interaction, ApiError> {
    if let Some(interaction) = redirect_without_customer(session) {
        return Ok(interaction);
    }
    ensure_page(session, Page::IssueManagement, "send_chat_message")?;

    if message.trim().is_empty() {
        return Ok(render(session));
    }

    session.push_turn(ChatTurn::customer(message));
    let reply = reply_to_customer(ctx.assistant.as_ref(), message).await;
    session.push_turn(ChatTurn::assistant(reply));
    Ok(render(session))
}

/// Summarizes the customer's side of the chat onto their record, then closes the chat.
pub async fn escalate(
    ctx: &ApiContext,
    session: &mut SessionContext,
) -> Result<Interaction, ApiError> {
    if let Some(interaction) = redirect_without_customer(session) {
        return Ok(interaction);
    }
    ensure_page(session, Page::IssueManagement, "escalate")?;
    let Some(customer_id) = session.customer_id() else {
        return Err(ApiError::new(
            ErrorCode::Internal,
            "chat session has no customer",
        ));
    };

    let summary = summarize_transcript(ctx.assistant.as_ref(), &session.customer_text()).await;
    let rows_affected = ctx
        .storage
        .set_issue_text(customer_id, &summary)
        .await
        .map_err(|err| {
            let cause = format!("{err:#}");
            error!(customer_id = customer_id.0, error = %cause, "escalation save failed");
            ApiError::new(
                ErrorCode::Internal,
                format!("Error saving chat history: {cause}"),
            )
        })?;

    if rows_affected == 0 {
        warn!(
            customer_id = customer_id.0,
            "customer record is gone; escalation summary was not stored"
        );
    }
    session.apply(PageEvent::Escalated).map_err(transition)?;
    info!(customer_id = customer_id.0, rows_affected, "chat escalated");
    let mut interaction = render(session);
    interaction.notices.push(Notice::success(ESCALATION_SAVED));
    Ok(interaction)
}

/// Existing-issue form submit.
pub async fn lookup_existing_issue(
    ctx: &ApiContext,
    session: &mut SessionContext,
    phone: &str,
) -> Result<Interaction, ApiError> {
    ensure_page(session, Page::ExistingIssue, "lookup_existing_issue")?;

    let phone = phone.trim();
    if phone.is_empty() {
        return Ok(existing_issue(None, Some(Notice::warning(BLANK_PHONE))));
    }

    let found = ctx.storage.find_by_phone(phone).await.map_err(internal)?;
    Ok(match found {
        Some(lookup) => match lookup.issue {
            Some(issue) => existing_issue(Some(issue), None),
            None => existing_issue(None, Some(Notice::warning(NO_ISSUE_RECORDED))),
        },
        None => existing_issue(None, Some(Notice::warning(NO_PREVIOUS_ISSUE))),
    })
}

pub async fn list_issues(ctx: &ApiContext) -> Result<Vec<CustomerIssue>, ApiError> {
    ctx.storage.list_records().await.map_err(internal)
}

/// Operator edit of every field. An unknown id affects no rows.
pub async fn update_issue(
    ctx: &ApiContext,
    customer_id: CustomerId,
    req: &UpdateIssueRequest,
) -> Result<MutationResponse, ApiError> {
    let contact = validate_contact(&CustomerContact {
        first_name: req.first_name.clone(),
        last_name: req.last_name.clone(),
        email: req.email.clone(),
        phone: req.phone.clone(),
    })
    .map_err(|e| ApiError::new(ErrorCode::Validation, e.to_string()))?;
    let issue = req
        .issue
        .as_deref()
        .map(str::trim)
        .filter(|issue| !issue.is_empty());

    let rows_affected = ctx
        .storage
        .update_record(customer_id, &contact, issue)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ApiError::new(ErrorCode::Conflict, DUPLICATE_CONTACT)
            } else {
                internal(err)
            }
        })?;
    info!(customer_id = customer_id.0, rows_affected, "issue record updated");
    Ok(MutationResponse { rows_affected })
}

pub async fn set_issue(
    ctx: &ApiContext,
    customer_id: CustomerId,
    text: &str,
) -> Result<MutationResponse, ApiError> {
    let rows_affected = ctx
        .storage
        .set_issue_text(customer_id, text)
        .await
        .map_err(internal)?;
    Ok(MutationResponse { rows_affected })
}

pub async fn delete_issue(
    ctx: &ApiContext,
    customer_id: CustomerId,
) -> Result<MutationResponse, ApiError> {
    let rows_affected = ctx
        .storage
        .delete_record(customer_id)
        .await
        .map_err(internal)?;
    info!(customer_id = customer_id.0, rows_affected, "issue record deleted");
    Ok(MutationResponse { rows_affected })
}

fn view_for(session: &SessionContext, previous_issue: Option<String>) -> PageView {
    match session.page() {
        Page::Home => PageView::Home,
        Page::NewIssue => PageView::NewIssue,
        Page::IssueManagement => match session.customer_id() {
            Some(customer_id) => PageView::IssueManagement {
                customer_id,
                transcript: session.transcript().to_vec(),
            },
            None => PageView::NewIssue,
        },
        Page::ExistingIssue => PageView::ExistingIssue { previous_issue },
    }
}

fn existing_issue(previous_issue: Option<String>, notice: Option<Notice>) -> Interaction {
    Interaction {
        view: PageView::ExistingIssue { previous_issue },
        notices: notice.into_iter().collect(),
    }
}

fn redirect_without_customer(session: &mut SessionContext) -> Option<Interaction> {
    let notice = session.enforce_chat_guard()?;
    Some(Interaction {
        view: view_for(session, None),
        notices: vec![notice],
    })
}

fn ensure_page(session: &SessionContext, expected: Page, action: &str) -> Result<(), ApiError> {
    if session.page() == expected {
        return Ok(());
    }
    Err(ApiError::new(
        ErrorCode::Conflict,
        format!("'{action}' is not available on the {} page", session.page()),
    ))
}

fn transition(err: TransitionError) -> ApiError {
    ApiError::new(ErrorCode::Conflict, err.to_string())
}

fn internal(err: anyhow::Error) -> ApiError {
    let message = format!("{err:#}");
    error!(error = %message, "storage failure");
    ApiError::new(ErrorCode::Internal, message)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
