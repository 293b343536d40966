//! In-memory registry of live review sessions, keyed by session id.
//!
//! Sessions are never persisted; a restart drops them and learners simply
//! start a new one from the current stored state.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::srs::session::{ReviewSession, SessionView};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, ReviewSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: ReviewSession) -> SessionView {
        let view = session.view();
        self.sessions
            .lock()
            .await
            .insert(session.id().to_string(), session);
        view
    }

    /// Runs `f` against the session under the registry lock. `None` if the
    /// session does not exist (never started, abandoned or evicted).
    pub async fn update<R>(&self, id: &str, f: impl FnOnce(&mut ReviewSession) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(id).map(f)
    }

    pub async fn view(&self, id: &str) -> Option<SessionView> {
        self.sessions.lock().await.get(id).map(ReviewSession::view)
    }

    pub async fn remove(&self, id: &str) -> Option<ReviewSession> {
        self.sessions.lock().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops sessions with no activity for `max_idle`. Returns how many
    /// were evicted.
    pub async fn evict_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity_at() < max_idle);
        before - sessions.len()
    }

    pub async fn clear(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let n = sessions.len();
        sessions.clear();
        n
    }
}
