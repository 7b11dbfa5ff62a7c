use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{SessionFilter, SessionStore, StoreError, StoreResult};
use crate::models::WorkSession;

/// Process-local session store. A single lock guards every read-modify-write,
/// so the active-session check and the version compare are atomic.
///
/// That lock is store-wide: calls for different users are serialized too.
/// Each critical section is a map lookup, so this only matters under heavy
/// contention; a sharded map would lift it.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, WorkSession>>,
    offline: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> StoreResult<Option<WorkSession>> {
        self.ensure_online()?;
        Ok(self.sessions.lock().await.get(session_id).cloned())
    }

    async fn get_active_for_user(&self, user_id: &str) -> StoreResult<Option<WorkSession>> {
        self.ensure_online()?;
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .values()
            .find(|session| session.user_id == user_id && session.is_open())
            .cloned())
    }

    async fn create(&self, session: WorkSession) -> StoreResult<WorkSession> {
        self.ensure_online()?;
        let mut sessions = self.sessions.lock().await;

        if session.is_open()
            && sessions
                .values()
                .any(|existing| existing.user_id == session.user_id && existing.is_open())
        {
            return Err(StoreError::ActiveSessionExists {
                user_id: session.user_id,
            });
        }
        if sessions.contains_key(&session.id) {
            return Err(StoreError::DuplicateSession {
                session_id: session.id,
            });
        }

        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn update(
        &self,
        mut session: WorkSession,
        expected_version: u64,
    ) -> StoreResult<WorkSession> {
        self.ensure_online()?;
        let mut sessions = self.sessions.lock().await;

        let stored = sessions
            .get_mut(&session.id)
            .ok_or_else(|| StoreError::Missing {
                session_id: session.id.clone(),
            })?;
        if stored.version != expected_version {
            return Err(StoreError::VersionMismatch {
                session_id: session.id,
                expected: expected_version,
            });
        }

        session.version = expected_version + 1;
        *stored = session.clone();
        Ok(session)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        filter: &SessionFilter,
    ) -> StoreResult<Vec<WorkSession>> {
        self.ensure_online()?;
        let sessions = self.sessions.lock().await;

        let mut matching: Vec<WorkSession> = sessions
            .values()
            .filter(|session| session.user_id == user_id && filter.matches(session))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        Ok(matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }
}
