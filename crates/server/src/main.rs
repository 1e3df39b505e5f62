use std::{net::SocketAddr, sync::Arc, time::Duration};

use assistant::ChatCompletionsClient;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use server_api::{
    delete_issue, escalate, list_issues, lookup_existing_issue, navigate, render,
    send_chat_message, set_issue, submit_intake, update_issue, ApiContext, SessionContext,
};
use shared::{
    domain::{CustomerContact, CustomerId, CustomerIssue, SessionId},
    error::{ApiError, ErrorCode},
    protocol::{
        ChatMessageRequest, CreateSessionResponse, Interaction, LookupRequest, MutationResponse,
        NavigateRequest, SetIssueRequest, UpdateIssueRequest,
    },
};
use storage::Storage;
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod app_state;
mod config;

use app_state::{AppState, SessionStore};
use config::{load_settings, normalize_database_url};

const MAX_REQUEST_BYTES: usize = 64 * 1024;

type Rejection = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings().map_err(|error| {
        error!(%error, "refusing to start");
        error
    })?;
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let assistant = ChatCompletionsClient::new(settings.assistant_config())?;
    info!(model = assistant.model(), "assistant client ready");

    let state = AppState {
        api: ApiContext::new(storage, Arc::new(assistant)),
        sessions: SessionStore::with_idle_ttl(settings.session_idle()),
    };
    spawn_session_sweeper(state.sessions.clone());
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_session_sweeper(sessions: SessionStore) {
    let period = (sessions.idle_ttl() / 2).clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = sessions.sweep().await;
            if evicted > 0 {
                info!(evicted, "idle sessions discarded");
            }
        }
    });
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions", post(create_session))
        .route(
            "/sessions/:session_id",
            get(http_render).delete(close_session),
        )
        .route("/sessions/:session_id/navigate", post(http_navigate))
        .route("/sessions/:session_id/intake", post(http_submit_intake))
        .route("/sessions/:session_id/chat", post(http_send_chat_message))
        .route("/sessions/:session_id/escalate", post(http_escalate))
        .route("/sessions/:session_id/lookup", post(http_lookup))
        .route("/issues", get(http_list_issues))
        .route(
            "/issues/:customer_id",
            put(http_update_issue).delete(http_delete_issue),
        )
        .route("/issues/:customer_id/issue", put(http_set_issue))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, Rejection> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn create_session(State(state): State<Arc<AppState>>) -> Json<CreateSessionResponse> {
    let (session_id, session) = state.sessions.create().await;
    let interaction = render(&mut *session.lock().await);
    info!(%session_id, "session opened");
    Json(CreateSessionResponse {
        session_id,
        interaction,
    })
}

async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    if state.sessions.remove(SessionId(session_id)).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found())
    }
}

async fn http_render(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Interaction>, Rejection> {
    let session = find_session(&state, session_id).await?;
    let interaction = render(&mut *session.lock().await);
    Ok(Json(interaction))
}

async fn http_navigate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<Interaction>, Rejection> {
    let session = find_session(&state, session_id).await?;
    let interaction = navigate(&mut *session.lock().await, req.action).map_err(reject)?;
    Ok(Json(interaction))
}

async fn http_submit_intake(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(form): Json<CustomerContact>,
) -> Result<Json<Interaction>, Rejection> {
    let session = find_session(&state, session_id).await?;
    let mut session = session.lock().await;
    let interaction = submit_intake(&state.api, &mut session, &form)
        .await
        .map_err(reject)?;
    Ok(Json(interaction))
}

async fn http_send_chat_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Json<Interaction>, Rejection> {
    let session = find_session(&state, session_id).await?;
    let mut session = session.lock().await;
    let interaction = send_chat_message(&state.api, &mut session, &req.message)
        .await
        .map_err(reject)?;
    Ok(Json(interaction))
}

async fn http_escalate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Interaction>, Rejection> {
    let session = find_session(&state, session_id).await?;
    let mut session = session.lock().await;
    let interaction = escalate(&state.api, &mut session)
        .await
        .map_err(reject)?;
    Ok(Json(interaction))
}

async fn http_lookup(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<LookupRequest>,
) -> Result<Json<Interaction>, Rejection> {
    let session = find_session(&state, session_id).await?;
    let mut session = session.lock().await;
    let interaction = lookup_existing_issue(&state.api, &mut session, &req.phone)
        .await
        .map_err(reject)?;
    Ok(Json(interaction))
}

async fn http_list_issues(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CustomerIssue>>, Rejection> {
    let issues = list_issues(&state.api).await.map_err(reject)?;
    Ok(Json(issues))
}

async fn http_update_issue(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<i64>,
    Json(req): Json<UpdateIssueRequest>,
) -> Result<Json<MutationResponse>, Rejection> {
    let result = update_issue(&state.api, CustomerId(customer_id), &req)
        .await
        .map_err(reject)?;
    Ok(Json(result))
}

async fn http_set_issue(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<i64>,
    Json(req): Json<SetIssueRequest>,
) -> Result<Json<MutationResponse>, Rejection> {
    let result = set_issue(&state.api, CustomerId(customer_id), &req.issue)
        .await
        .map_err(reject)?;
    Ok(Json(result))
}

async fn http_delete_issue(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<i64>,
) -> Result<Json<MutationResponse>, Rejection> {
    let result = delete_issue(&state.api, CustomerId(customer_id))
        .await
        .map_err(reject)?;
    Ok(Json(result))
}

async fn find_session(
    state: &AppState,
    session_id: Uuid,
) -> Result<Arc<Mutex<SessionContext>>, Rejection> {
    state
        .sessions
        .get(SessionId(session_id))
        .await
        .ok_or_else(session_not_found)
}

fn session_not_found() -> Rejection {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(ErrorCode::NotFound, "session not found")),
    )
}

fn reject(err: ApiError) -> Rejection {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
