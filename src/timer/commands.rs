//! Caller-facing request/response surface. Requests and responses are serde
//! types so any transport (HTTP handler, RPC, IPC) can forward them as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    clock::Clock,
    error::TrackerError,
    models::{SessionInfo, WorkSummary},
    store::{SessionFilter, SessionStore},
    timer::TrackerService,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Conflict,
    NotFound,
    Forbidden,
    InvalidTransition,
    Validation,
    StoreUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<TrackerError> for CommandError {
    fn from(err: TrackerError) -> Self {
        let code = match &err {
            TrackerError::Conflict(_) => ErrorCode::Conflict,
            TrackerError::NotFound { .. } => ErrorCode::NotFound,
            TrackerError::Forbidden { .. } => ErrorCode::Forbidden,
            TrackerError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            TrackerError::Validation(_) => ErrorCode::Validation,
            TrackerError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub user_id: String,
    pub workspace_id: String,
}

/// Pause or resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishSessionRequest {
    pub session_id: String,
    pub user_id: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub filter: SessionFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub user_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// A request tagged by its `action` field, e.g. `{"action": "pause", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum TrackerCommand {
    Start(StartSessionRequest),
    Pause(SessionRequest),
    Resume(SessionRequest),
    Finish(FinishSessionRequest),
    Active(UserRequest),
    List(ListSessionsRequest),
    Summary(SummaryRequest),
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Session(SessionInfo),
    ActiveSession(Option<SessionInfo>),
    Sessions(Vec<SessionInfo>),
    Summary(WorkSummary),
}

pub async fn start_session<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    request: StartSessionRequest,
) -> CommandResult<SessionInfo> {
    let session = tracker
        .start_session(&request.user_id, &request.workspace_id)
        .await?;
    Ok(tracker.info(&session))
}

pub async fn pause_session<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    request: SessionRequest,
) -> CommandResult<SessionInfo> {
    let session = tracker
        .pause_session(&request.session_id, &request.user_id)
        .await?;
    Ok(tracker.info(&session))
}

pub async fn resume_session<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    request: SessionRequest,
) -> CommandResult<SessionInfo> {
    let session = tracker
        .resume_session(&request.session_id, &request.user_id)
        .await?;
    Ok(tracker.info(&session))
}

pub async fn finish_session<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    request: FinishSessionRequest,
) -> CommandResult<SessionInfo> {
    let session = tracker
        .finish_session(
            &request.session_id,
            &request.user_id,
            &request.subject,
            request.description.as_deref(),
        )
        .await?;
    Ok(tracker.info(&session))
}

pub async fn get_active_session<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    request: UserRequest,
) -> CommandResult<Option<SessionInfo>> {
    let session = tracker.get_active_session(&request.user_id).await?;
    Ok(session.map(|session| tracker.info(&session)))
}

pub async fn list_sessions<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    request: ListSessionsRequest,
) -> CommandResult<Vec<SessionInfo>> {
    let sessions = tracker
        .list_sessions(&request.user_id, request.filter)
        .await?;
    Ok(sessions.iter().map(|session| tracker.info(session)).collect())
}

pub async fn summarize<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    request: SummaryRequest,
) -> CommandResult<WorkSummary> {
    Ok(tracker
        .summarize(&request.user_id, request.from, request.to)
        .await?)
}

pub async fn dispatch<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    command: TrackerCommand,
) -> CommandResult<CommandResponse> {
    let response = match command {
        TrackerCommand::Start(request) => {
            CommandResponse::Session(start_session(tracker, request).await?)
        }
        TrackerCommand::Pause(request) => {
            CommandResponse::Session(pause_session(tracker, request).await?)
        }
        TrackerCommand::Resume(request) => {
            CommandResponse::Session(resume_session(tracker, request).await?)
        }
        TrackerCommand::Finish(request) => {
            CommandResponse::Session(finish_session(tracker, request).await?)
        }
        TrackerCommand::Active(request) => {
            CommandResponse::ActiveSession(get_active_session(tracker, request).await?)
        }
        TrackerCommand::List(request) => {
            CommandResponse::Sessions(list_sessions(tracker, request).await?)
        }
        TrackerCommand::Summary(request) => {
            CommandResponse::Summary(summarize(tracker, request).await?)
        }
    };
    Ok(response)
}

/// Decodes a JSON command, runs it and wraps the outcome as
/// `{"ok": true, "data": ...}` or `{"ok": false, "error": {code, message}}`.
pub async fn dispatch_json<S: SessionStore, C: Clock>(
    tracker: &TrackerService<S, C>,
    body: &str,
) -> Value {
    let outcome = match serde_json::from_str::<TrackerCommand>(body) {
        Ok(command) => dispatch(tracker, command).await,
        Err(err) => Err(CommandError {
            code: ErrorCode::Validation,
            message: format!("malformed command: {err}"),
        }),
    };

    match outcome {
        Ok(data) => json!({ "ok": true, "data": data }),
        Err(error) => json!({ "ok": false, "error": error }),
    }
}
