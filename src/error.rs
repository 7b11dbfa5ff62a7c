//! Error kinds returned by tracker operations.

use crate::models::{SessionAction, SessionStatus};
use crate::store::StoreError;

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Active-session invariant or a concurrent update collided with this request.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("session {session_id} not found")]
    NotFound { session_id: String },

    #[error("session {session_id} does not belong to user {user_id}")]
    Forbidden { session_id: String, user_id: String },

    #[error("cannot {action} a session that is {from}")]
    InvalidTransition {
        action: SessionAction,
        from: SessionStatus,
    },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
}

impl TrackerError {
    pub fn validation(message: impl Into<String>) -> Self {
        TrackerError::Validation(message.into())
    }
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ActiveSessionExists { .. }
            | StoreError::DuplicateSession { .. }
            | StoreError::VersionMismatch { .. } => TrackerError::Conflict(err.to_string()),
            StoreError::Missing { session_id } => TrackerError::NotFound { session_id },
            StoreError::Unavailable(message) => TrackerError::StoreUnavailable(message),
        }
    }
}
