//! Legal transitions and worked-time accounting for a single work session.
//!
//! Everything here is pure: callers pass the current instant in and persist
//! the mutated record themselves. A transition that fails leaves the session
//! untouched.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};
use crate::models::{PauseInterval, SessionAction, SessionStatus, WorkSession};

/// New session in `Active`, started at `now`.
pub fn start(user_id: &str, workspace_id: &str, now: DateTime<Utc>) -> WorkSession {
    WorkSession {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        workspace_id: workspace_id.to_string(),
        started_at: now,
        ended_at: None,
        paused_intervals: Vec::new(),
        subject: None,
        description: None,
        version: 0,
    }
}

pub fn pause(session: &mut WorkSession, now: DateTime<Utc>) -> TrackerResult<()> {
    require(session, SessionAction::Pause, &[SessionStatus::Active])?;
    let at = effective_now(session, now);
    session.paused_intervals.push(PauseInterval::open(at));
    Ok(())
}

pub fn resume(session: &mut WorkSession, now: DateTime<Utc>) -> TrackerResult<()> {
    require(session, SessionAction::Resume, &[SessionStatus::Paused])?;
    let at = effective_now(session, now);
    close_open_pause(session, at);
    Ok(())
}

/// Closes any open pause, stamps `ended_at` and attaches the metadata.
/// `subject` is trimmed and must not be empty; a blank description is dropped.
pub fn finish(
    session: &mut WorkSession,
    now: DateTime<Utc>,
    subject: &str,
    description: Option<&str>,
) -> TrackerResult<()> {
    require(
        session,
        SessionAction::Finish,
        &[SessionStatus::Active, SessionStatus::Paused],
    )?;

    let subject = subject.trim();
    if subject.is_empty() {
        return Err(TrackerError::validation("subject must not be empty"));
    }
    let description = description
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    let at = effective_now(session, now);
    close_open_pause(session, at);
    session.ended_at = Some(at);
    session.subject = Some(subject.to_string());
    session.description = description;
    Ok(())
}

/// Worked time in whole seconds: wall time since start (up to `ended_at` when
/// finished) minus every pause, with an open pause counted up to `now`.
/// Clamped to zero when the clock reads earlier than the session start.
pub fn elapsed_worked_seconds(session: &WorkSession, now: DateTime<Utc>) -> u64 {
    let end = session.ended_at.unwrap_or(now);
    if end <= session.started_at {
        return 0;
    }

    let paused = session
        .paused_intervals
        .iter()
        .fold(Duration::zero(), |total, pause| total + pause.duration_until(end));

    let worked = (end - session.started_at) - paused;
    u64::try_from(worked.num_seconds()).unwrap_or(0)
}

fn require(
    session: &WorkSession,
    action: SessionAction,
    allowed: &[SessionStatus],
) -> TrackerResult<()> {
    let from = session.status();
    if allowed.contains(&from) {
        Ok(())
    } else {
        Err(TrackerError::InvalidTransition { action, from })
    }
}

// A clock that went backwards must not break interval ordering.
fn effective_now(session: &WorkSession, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(session.last_recorded_at())
}

fn close_open_pause(session: &mut WorkSession, at: DateTime<Utc>) {
    if let Some(pause) = session.paused_intervals.last_mut() {
        if pause.is_open() {
            pause.pause_end = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 14, 9, 0, 0).unwrap()
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn start_creates_active_session() {
        let session = start("u1", "w1", t0());
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.started_at, t0());
        assert_eq!(session.workspace_id, "w1");
        assert!(session.paused_intervals.is_empty());
        assert_eq!(session.version, 0);
        assert!(Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn pause_resume_finish_scenario_counts_only_worked_time() {
        let mut session = start("u1", "w1", t0());
        pause(&mut session, t0() + secs(300)).unwrap();
        resume(&mut session, t0() + secs(900)).unwrap();
        finish(&mut session, t0() + secs(1200), "Sprint review", None).unwrap();

        assert_eq!(elapsed_worked_seconds(&session, t0() + secs(5000)), 600);
        assert_eq!(session.ended_at, Some(t0() + secs(1200)));
        assert_eq!(session.subject.as_deref(), Some("Sprint review"));
    }

    #[test]
    fn many_pause_cycles_subtract_every_closed_pause() {
        let mut session = start("u1", "w1", t0());
        let mut now = t0();
        let mut paused_total = 0;

        for (work, rest) in [(60, 30), (17, 240), (1, 1), (600, 59), (5, 3600)] {
            now += secs(work);
            pause(&mut session, now).unwrap();
            now += secs(rest);
            resume(&mut session, now).unwrap();
            paused_total += rest;
        }
        now += secs(42);

        let wall = (now - t0()).num_seconds();
        assert_eq!(elapsed_worked_seconds(&session, now), (wall - paused_total) as u64);
        assert_eq!(session.paused_intervals.len(), 5);
    }

    #[test]
    fn open_pause_is_excluded_up_to_now() {
        let mut session = start("u1", "w1", t0());
        pause(&mut session, t0() + secs(100)).unwrap();

        assert_eq!(elapsed_worked_seconds(&session, t0() + secs(100)), 100);
        assert_eq!(elapsed_worked_seconds(&session, t0() + secs(10_000)), 100);
    }

    #[test]
    fn pause_twice_is_rejected_without_changes() {
        let mut session = start("u1", "w1", t0());
        pause(&mut session, t0() + secs(10)).unwrap();
        let before = session.clone();

        let err = pause(&mut session, t0() + secs(20)).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidTransition {
                action: SessionAction::Pause,
                from: SessionStatus::Paused
            }
        ));
        assert_eq!(session, before);
    }

    #[test]
    fn resume_requires_paused() {
        let mut session = start("u1", "w1", t0());
        let err = resume(&mut session, t0() + secs(5)).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidTransition {
                from: SessionStatus::Active,
                ..
            }
        ));
    }

    #[test]
    fn finish_closes_open_pause() {
        let mut session = start("u1", "w1", t0());
        pause(&mut session, t0() + secs(120)).unwrap();
        finish(&mut session, t0() + secs(180), "Standup", Some("  notes  ")).unwrap();

        assert!(!session.is_paused());
        assert_eq!(
            session.paused_intervals.last().unwrap().pause_end,
            Some(t0() + secs(180))
        );
        assert_eq!(session.description.as_deref(), Some("notes"));
        assert_eq!(elapsed_worked_seconds(&session, t0() + secs(999)), 120);
    }

    #[test]
    fn finish_rejects_blank_subject_and_leaves_session_open() {
        let mut session = start("u1", "w1", t0());
        pause(&mut session, t0() + secs(30)).unwrap();
        let before = session.clone();

        let err = finish(&mut session, t0() + secs(60), "   ", None).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
        assert_eq!(session, before);
    }

    #[test]
    fn completed_is_terminal() {
        let mut session = start("u1", "w1", t0());
        finish(&mut session, t0() + secs(60), "Done", Some("")).unwrap();
        assert_eq!(session.description, None);
        let before = session.clone();

        assert!(pause(&mut session, t0() + secs(61)).is_err());
        assert!(resume(&mut session, t0() + secs(62)).is_err());
        let err = finish(&mut session, t0() + secs(63), "Again", None).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidTransition {
                action: SessionAction::Finish,
                from: SessionStatus::Completed
            }
        ));
        assert_eq!(session, before);
    }

    #[test]
    fn skewed_clock_keeps_intervals_ordered() {
        let mut session = start("u1", "w1", t0());
        pause(&mut session, t0() + secs(50)).unwrap();
        resume(&mut session, t0() + secs(20)).unwrap();
        finish(&mut session, t0() - secs(100), "Skew", None).unwrap();

        let pause = &session.paused_intervals[0];
        assert_eq!(pause.pause_end, Some(pause.pause_start));
        assert!(session.ended_at.unwrap() >= pause.pause_start);
        assert_eq!(elapsed_worked_seconds(&session, t0()), 50);
    }

    #[test]
    fn elapsed_clamps_before_start() {
        let session = start("u1", "w1", t0());
        assert_eq!(elapsed_worked_seconds(&session, t0() - secs(3600)), 0);
    }

    #[test]
    fn elapsed_truncates_to_whole_seconds() {
        let session = start("u1", "w1", t0());
        let now = t0() + Duration::milliseconds(2_999);
        assert_eq!(elapsed_worked_seconds(&session, now), 2);
    }
}
