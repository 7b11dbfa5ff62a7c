//! Work session records and the payloads handed back to callers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PauseInterval;
use crate::{timer::state::elapsed_worked_seconds, utils::format::format_hms};

/// Lifecycle state, always derived from `ended_at` and `paused_intervals`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    Finish,
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionAction::Start => "start",
            SessionAction::Pause => "pause",
            SessionAction::Resume => "resume",
            SessionAction::Finish => "finish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: String,
    pub user_id: String,
    pub workspace_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub paused_intervals: Vec<PauseInterval>,
    pub subject: Option<String>,
    pub description: Option<String>,
    /// Optimistic concurrency token; bumped by the store on every update.
    pub version: u64,
}

impl WorkSession {
    pub fn status(&self) -> SessionStatus {
        if self.ended_at.is_some() {
            SessionStatus::Completed
        } else if self.is_paused() {
            SessionStatus::Paused
        } else {
            SessionStatus::Active
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_intervals
            .last()
            .map(PauseInterval::is_open)
            .unwrap_or(false)
    }

    /// Not finished yet, whether running or paused.
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Latest instant recorded anywhere on the session.
    pub fn last_recorded_at(&self) -> DateTime<Utc> {
        let pause_edges = self
            .paused_intervals
            .iter()
            .flat_map(|pause| std::iter::once(pause.pause_start).chain(pause.pause_end));

        std::iter::once(self.started_at)
            .chain(pause_edges)
            .chain(self.ended_at)
            .max()
            .unwrap_or(self.started_at)
    }
}

/// Session as reported to callers, with elapsed time computed at a given instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: String,
    pub workspace_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub paused_intervals: Vec<PauseInterval>,
    pub is_paused: bool,
    pub status: SessionStatus,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub worked_seconds: u64,
    pub tracked_duration: String,
    pub version: u64,
}

impl SessionInfo {
    pub fn at(session: &WorkSession, now: DateTime<Utc>) -> Self {
        let worked_seconds = elapsed_worked_seconds(session, now);
        Self {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            workspace_id: session.workspace_id.clone(),
            started_at: session.started_at,
            ended_at: session.ended_at,
            paused_intervals: session.paused_intervals.clone(),
            is_paused: session.is_paused(),
            status: session.status(),
            subject: session.subject.clone(),
            description: session.description.clone(),
            worked_seconds,
            tracked_duration: format_hms(worked_seconds),
            version: session.version,
        }
    }
}

/// Worked time over sessions started in `[from, to)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkSummary {
    pub user_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub session_count: usize,
    pub worked_seconds: u64,
    pub tracked_duration: String,
}
