use chrono::{Duration, Utc};

use crate::srs::registry::SessionRegistry;

pub async fn run(sessions: &SessionRegistry, max_idle: Duration) {
    tracing::debug!("session_cleanup: start");
    let evicted = sessions.evict_idle(Utc::now(), max_idle).await;
    if evicted > 0 {
        let remaining = sessions.len().await;
        tracing::info!(evicted, remaining, "session_cleanup: done");
    } else {
        tracing::debug!("session_cleanup: nothing idle");
    }
}
