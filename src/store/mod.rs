//! Persistence contract the tracker relies on.
//!
//! Implementations must make `create` and `update` atomic: `create` enforces
//! at most one open session per user, `update` is a compare-and-swap on the
//! session's version.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::WorkSession;

pub mod memory;

pub use memory::MemorySessionStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("user {user_id} already has an active session")]
    ActiveSessionExists { user_id: String },

    #[error("session {session_id} was modified concurrently (expected version {expected})")]
    VersionMismatch { session_id: String, expected: u64 },

    #[error("session id {session_id} is already taken")]
    DuplicateSession { session_id: String },

    #[error("session {session_id} does not exist")]
    Missing { session_id: String },

    #[error("{0}")]
    Unavailable(String),
}

impl StoreError {
    /// Recovers a typed store error from an `anyhow` chain; anything else is
    /// treated as the backend being unavailable.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<StoreError>() {
            Ok(store_err) => store_err,
            Err(other) => StoreError::Unavailable(format!("{other:#}")),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// History query over one user's sessions, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionFilter {
    /// Inclusive lower bound on `started_at`.
    pub started_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `started_at`.
    pub started_to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SessionFilter {
    pub fn started_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            started_from: Some(from),
            started_to: Some(to),
            ..Self::default()
        }
    }

    pub fn matches(&self, session: &WorkSession) -> bool {
        let after_from = self
            .started_from
            .map_or(true, |from| session.started_at >= from);
        let before_to = self.started_to.map_or(true, |to| session.started_at < to);
        after_from && before_to
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> StoreResult<Option<WorkSession>>;

    async fn get_active_for_user(&self, user_id: &str) -> StoreResult<Option<WorkSession>>;

    /// Fails with `ActiveSessionExists` if the user already has an open session
    /// and with `DuplicateSession` if the id is taken.
    async fn create(&self, session: WorkSession) -> StoreResult<WorkSession>;

    /// Writes `session` only if the stored version still equals `expected_version`.
    /// The returned record carries the new version.
    async fn update(&self, session: WorkSession, expected_version: u64)
        -> StoreResult<WorkSession>;

    async fn list_for_user(
        &self,
        user_id: &str,
        filter: &SessionFilter,
    ) -> StoreResult<Vec<WorkSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn typed_errors_survive_an_anyhow_round_trip() {
        let original = StoreError::VersionMismatch {
            session_id: "s1".into(),
            expected: 4,
        };
        let wrapped = anyhow::Error::new(original.clone());
        assert_eq!(StoreError::from_anyhow(wrapped), original);
    }

    #[test]
    fn backend_failures_become_unavailable() {
        let err = Err::<(), _>(std::io::Error::other("disk I/O error"))
            .context("failed to load session")
            .unwrap_err();

        match StoreError::from_anyhow(err) {
            StoreError::Unavailable(message) => {
                assert!(message.contains("failed to load session"));
                assert!(message.contains("disk I/O error"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
