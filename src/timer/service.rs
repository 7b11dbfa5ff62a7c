use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::{
    clock::Clock,
    config::TrackerConfig,
    error::{TrackerError, TrackerResult},
    log_transition,
    models::{SessionAction, SessionInfo, WorkSession, WorkSummary},
    store::{SessionFilter, SessionStore, StoreError},
    utils::format::format_hms,
};

use super::state;

const ENABLE_LOGS: bool = true;

/// Per-user work-session tracker. Holds no timers; every answer is derived
/// from the stored timestamps and the clock.
pub struct TrackerService<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    config: Arc<TrackerConfig>,
}

impl<S, C> Clone for TrackerService<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: SessionStore, C: Clock> TrackerService<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self::with_config(store, clock, TrackerConfig::default())
    }

    pub fn with_config(store: S, clock: C, config: TrackerConfig) -> Self {
        Self {
            store: Arc::new(store),
            clock: Arc::new(clock),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the caller's open session if there is one, otherwise starts a
    /// new one. Safe to call repeatedly.
    pub async fn start_session(
        &self,
        user_id: &str,
        workspace_id: &str,
    ) -> TrackerResult<WorkSession> {
        require_id("userId", user_id)?;

        let existing = self
            .store
            .get_active_for_user(user_id)
            .await
            .map_err(store_failure)?;
        if let Some(existing) = existing {
            debug!("User {user_id} already has open session {}", existing.id);
            return Ok(existing);
        }

        let session = state::start(user_id, workspace_id, self.clock.now());
        match self.store.create(session).await {
            Ok(created) => {
                log_transition!(created, SessionAction::Start);
                Ok(created)
            }
            Err(StoreError::ActiveSessionExists { .. }) => {
                // Lost a concurrent start; hand back the winner.
                self.store
                    .get_active_for_user(user_id)
                    .await
                    .map_err(store_failure)?
                    .ok_or_else(|| {
                        TrackerError::Conflict(format!(
                            "active session for user {user_id} changed during start"
                        ))
                    })
            }
            Err(err) => Err(store_failure(err)),
        }
    }

    pub async fn pause_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> TrackerResult<WorkSession> {
        self.transition(session_id, user_id, SessionAction::Pause, state::pause)
            .await
    }

    pub async fn resume_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> TrackerResult<WorkSession> {
        self.transition(session_id, user_id, SessionAction::Resume, state::resume)
            .await
    }

    pub async fn finish_session(
        &self,
        session_id: &str,
        user_id: &str,
        subject: &str,
        description: Option<&str>,
    ) -> TrackerResult<WorkSession> {
        check_len("subject", subject.trim(), self.config.max_subject_len)?;
        if let Some(description) = description {
            check_len("description", description.trim(), self.config.max_description_len)?;
        }

        self.transition(session_id, user_id, SessionAction::Finish, |session, now| {
            state::finish(session, now, subject, description)
        })
        .await
    }

    /// The caller's running or paused session, used by clients to resync
    /// their displayed counter after a reload.
    pub async fn get_active_session(&self, user_id: &str) -> TrackerResult<Option<WorkSession>> {
        require_id("userId", user_id)?;
        self.store
            .get_active_for_user(user_id)
            .await
            .map_err(store_failure)
    }

    /// The caller's sessions, newest first. The page size is defaulted and
    /// clamped from the config.
    pub async fn list_sessions(
        &self,
        user_id: &str,
        filter: SessionFilter,
    ) -> TrackerResult<Vec<WorkSession>> {
        require_id("userId", user_id)?;
        if let (Some(from), Some(to)) = (filter.started_from, filter.started_to) {
            if from > to {
                return Err(TrackerError::validation("startedFrom must not be after startedTo"));
            }
        }

        let filter = SessionFilter {
            limit: Some(self.config.page_size(filter.limit)),
            ..filter
        };
        self.store
            .list_for_user(user_id, &filter)
            .await
            .map_err(store_failure)
    }

    /// Total worked time over sessions started in `[from, to)`; open
    /// sessions count up to now.
    pub async fn summarize(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TrackerResult<WorkSummary> {
        require_id("userId", user_id)?;
        if to <= from {
            return Err(TrackerError::validation("summary range must end after it starts"));
        }

        let sessions = self
            .store
            .list_for_user(user_id, &SessionFilter::started_between(from, to))
            .await
            .map_err(store_failure)?;

        let now = self.clock.now();
        let worked_seconds: u64 = sessions
            .iter()
            .map(|session| state::elapsed_worked_seconds(session, now))
            .sum();

        Ok(WorkSummary {
            user_id: user_id.to_string(),
            from,
            to,
            session_count: sessions.len(),
            worked_seconds,
            tracked_duration: format_hms(worked_seconds),
        })
    }

    pub fn elapsed_worked_seconds(&self, session: &WorkSession) -> u64 {
        state::elapsed_worked_seconds(session, self.clock.now())
    }

    pub fn info(&self, session: &WorkSession) -> SessionInfo {
        SessionInfo::at(session, self.clock.now())
    }

    // Single read-modify-write: load, check ownership, apply, compare-and-swap.
    async fn transition<F>(
        &self,
        session_id: &str,
        user_id: &str,
        action: SessionAction,
        apply: F,
    ) -> TrackerResult<WorkSession>
    where
        F: FnOnce(&mut WorkSession, DateTime<Utc>) -> TrackerResult<()> + Send,
    {
        require_id("sessionId", session_id)?;
        require_id("userId", user_id)?;

        let mut session = self
            .store
            .get(session_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| TrackerError::NotFound {
                session_id: session_id.to_string(),
            })?;

        if session.user_id != user_id {
            warn!("User {user_id} tried to {action} session {session_id} owned by another user");
            return Err(TrackerError::Forbidden {
                session_id: session_id.to_string(),
                user_id: user_id.to_string(),
            });
        }

        let expected_version = session.version;
        apply(&mut session, self.clock.now())?;

        let saved = self
            .store
            .update(session, expected_version)
            .await
            .map_err(store_failure)?;
        log_transition!(saved, action);
        Ok(saved)
    }
}

fn store_failure(err: StoreError) -> TrackerError {
    warn!("Session store call failed: {err}");
    err.into()
}

fn require_id(field: &str, value: &str) -> TrackerResult<()> {
    if value.trim().is_empty() {
        Err(TrackerError::validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

fn check_len(field: &str, value: &str, max: usize) -> TrackerResult<()> {
    let len = value.chars().count();
    if len > max {
        Err(TrackerError::validation(format!(
            "{field} is {len} characters, limit is {max}"
        )))
    } else {
        Ok(())
    }
}
