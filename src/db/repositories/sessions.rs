use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, is_unique_violation, parse_datetime, parse_optional_datetime, to_i64,
        to_u64,
    },
};
use crate::models::{PauseInterval, WorkSession};
use crate::store::{SessionFilter, SessionStore, StoreError, StoreResult};

const SESSION_COLUMNS: &str =
    "id, user_id, workspace_id, started_at, ended_at, subject, description, version";

fn row_to_session(row: &Row) -> Result<WorkSession> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let version: i64 = row.get("version")?;

    Ok(WorkSession {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        workspace_id: row.get("workspace_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        paused_intervals: Vec::new(),
        subject: row.get("subject")?,
        description: row.get("description")?,
        version: to_u64(version, "version")?,
    })
}

fn load_pauses(conn: &Connection, session_id: &str) -> Result<Vec<PauseInterval>> {
    let mut stmt = conn.prepare(
        "SELECT pause_start, pause_end
         FROM pause_intervals
         WHERE session_id = ?1
         ORDER BY position ASC",
    )?;

    let mut rows = stmt.query(params![session_id])?;
    let mut pauses = Vec::new();
    while let Some(row) = rows.next()? {
        let pause_start: String = row.get(0)?;
        let pause_end: Option<String> = row.get(1)?;
        pauses.push(PauseInterval {
            pause_start: parse_datetime(&pause_start, "pause_start")?,
            pause_end: parse_optional_datetime(pause_end, "pause_end")?,
        });
    }
    Ok(pauses)
}

fn query_sessions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<WorkSession>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }
    drop(rows);

    for session in &mut sessions {
        session.paused_intervals = load_pauses(conn, &session.id)?;
    }
    Ok(sessions)
}

fn replace_pauses(tx: &Transaction<'_>, session: &WorkSession) -> Result<()> {
    tx.execute(
        "DELETE FROM pause_intervals WHERE session_id = ?1",
        params![session.id],
    )?;

    let mut stmt = tx.prepare(
        "INSERT INTO pause_intervals (session_id, position, pause_start, pause_end)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, pause) in session.paused_intervals.iter().enumerate() {
        stmt.execute(params![
            session.id,
            to_i64(position as u64)?,
            format_datetime(&pause.pause_start),
            pause.pause_end.as_ref().map(format_datetime),
        ])?;
    }
    Ok(())
}

#[async_trait]
impl SessionStore for Database {
    async fn get(&self, session_id: &str) -> StoreResult<Option<WorkSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM work_sessions WHERE id = ?1");
            Ok(query_sessions(conn, &sql, params![session_id])?
                .into_iter()
                .next())
        })
        .await
        .map_err(StoreError::from_anyhow)
    }

    async fn get_active_for_user(&self, user_id: &str) -> StoreResult<Option<WorkSession>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM work_sessions
                 WHERE user_id = ?1 AND ended_at IS NULL
                 ORDER BY started_at DESC
                 LIMIT 1"
            );
            Ok(query_sessions(conn, &sql, params![user_id])?
                .into_iter()
                .next())
        })
        .await
        .map_err(StoreError::from_anyhow)
    }

    async fn create(&self, session: WorkSession) -> StoreResult<WorkSession> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            if session.is_open() {
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT id FROM work_sessions WHERE user_id = ?1 AND ended_at IS NULL",
                        params![session.user_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if existing.is_some() {
                    return Err(StoreError::ActiveSessionExists {
                        user_id: session.user_id,
                    }
                    .into());
                }
            }

            let now = format_datetime(&Utc::now());
            let inserted = tx.execute(
                "INSERT INTO work_sessions
                    (id, user_id, workspace_id, started_at, ended_at, subject, description,
                     version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    session.id,
                    session.user_id,
                    session.workspace_id,
                    format_datetime(&session.started_at),
                    session.ended_at.as_ref().map(format_datetime),
                    session.subject,
                    session.description,
                    to_i64(session.version)?,
                    now,
                ],
            );
            match inserted {
                Err(err) if is_unique_violation(&err, "work_sessions.user_id") => {
                    return Err(StoreError::ActiveSessionExists {
                        user_id: session.user_id,
                    }
                    .into());
                }
                Err(err) if is_unique_violation(&err, "work_sessions.id") => {
                    return Err(StoreError::DuplicateSession {
                        session_id: session.id,
                    }
                    .into());
                }
                other => {
                    other?;
                }
            }

            replace_pauses(&tx, &session)?;
            tx.commit()?;
            Ok(session)
        })
        .await
        .map_err(StoreError::from_anyhow)
    }

    async fn update(
        &self,
        mut session: WorkSession,
        expected_version: u64,
    ) -> StoreResult<WorkSession> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let next_version = expected_version + 1;

            let updated = tx.execute(
                "UPDATE work_sessions
                 SET workspace_id = ?1,
                     ended_at = ?2,
                     subject = ?3,
                     description = ?4,
                     version = ?5,
                     updated_at = ?6
                 WHERE id = ?7 AND version = ?8",
                params![
                    session.workspace_id,
                    session.ended_at.as_ref().map(format_datetime),
                    session.subject,
                    session.description,
                    to_i64(next_version)?,
                    format_datetime(&Utc::now()),
                    session.id,
                    to_i64(expected_version)?,
                ],
            )?;

            if updated == 0 {
                let exists: Option<String> = tx
                    .query_row(
                        "SELECT id FROM work_sessions WHERE id = ?1",
                        params![session.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let err = match exists {
                    Some(_) => StoreError::VersionMismatch {
                        session_id: session.id,
                        expected: expected_version,
                    },
                    None => StoreError::Missing {
                        session_id: session.id,
                    },
                };
                return Err(err.into());
            }

            replace_pauses(&tx, &session)?;
            tx.commit()?;

            session.version = next_version;
            Ok(session)
        })
        .await
        .map_err(StoreError::from_anyhow)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        filter: &SessionFilter,
    ) -> StoreResult<Vec<WorkSession>> {
        let user_id = user_id.to_string();
        let started_from = filter.started_from.as_ref().map(format_datetime);
        let started_to = filter.started_to.as_ref().map(format_datetime);
        // SQLite treats a negative LIMIT as unbounded.
        let limit = filter.limit.map_or(-1, |limit| limit.min(i64::MAX as usize) as i64);
        let offset = filter.offset.min(i64::MAX as usize) as i64;

        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM work_sessions
                 WHERE user_id = ?1
                   AND (?2 IS NULL OR started_at >= ?2)
                   AND (?3 IS NULL OR started_at < ?3)
                 ORDER BY started_at DESC
                 LIMIT ?4 OFFSET ?5"
            );
            query_sessions(
                conn,
                &sql,
                params![user_id, started_from, started_to, limit, offset],
            )
        })
        .await
        .map_err(StoreError::from_anyhow)
    }
}
