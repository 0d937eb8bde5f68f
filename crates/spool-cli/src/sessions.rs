//! In-memory session repository and the `narrate` operation over it.
//!
//! A session that cannot be found is an ordinary operation failure and goes
//! through the scheduler's retry path like any other.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use spool_core::{ItemOperation, OperationError};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub title: String,
    pub narrations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self {
            title: format!("Session {session_id}"),
            session_id,
            narrations: 0,
            narration: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Looks the session up, writes a narration back and returns the updated
/// record. With `fail_every = Some(n)` every n-th call fails.
pub struct NarrateOperation {
    sessions: Arc<SessionRepository>,
    fail_every: Option<u32>,
    calls: AtomicU32,
}

impl NarrateOperation {
    pub fn new(sessions: Arc<SessionRepository>, fail_every: Option<u32>) -> Self {
        Self {
            sessions,
            fail_every: fail_every.filter(|n| *n > 0),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ItemOperation for NarrateOperation {
    async fn run(
        &self,
        item_id: &str,
        _data: &serde_json::Value,
    ) -> Result<serde_json::Value, OperationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every.is_some_and(|n| call % n == 0) {
            return Err(OperationError::new(format!(
                "narration service unavailable (call {call})"
            )));
        }

        let mut session = self
            .sessions
            .get(item_id)
            .await
            .ok_or_else(|| OperationError::new(format!("session {item_id} not found")))?;

        session.narrations += 1;
        session.narration = Some(format!(
            "{} narrated ({} time(s))",
            session.title, session.narrations
        ));
        self.sessions.save(session.clone()).await;
        debug!(session_id = item_id, call, "session narrated");

        serde_json::to_value(&session).map_err(OperationError::from_display)
    }
}
