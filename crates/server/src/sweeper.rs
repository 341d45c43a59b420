use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gradedesk_core::sessions::SessionStore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Periodically evicts idle sessions. Returns `None` when the store has no
/// idle TTL, since nothing could ever expire.
pub fn spawn(sessions: Arc<SessionStore>, interval: Duration) -> Option<JoinHandle<()>> {
    let ttl = sessions.idle_ttl()?;
    let interval = interval.max(Duration::from_millis(1));

    info!(
        event_name = "system.sessions.sweeper_started",
        idle_ttl_secs = ttl.num_seconds(),
        interval_ms = interval.as_millis() as u64,
        "session sweeper started"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(Utc::now()).await;
            if evicted > 0 {
                info!(
                    event_name = "system.sessions.evicted",
                    evicted,
                    "idle sessions evicted"
                );
            } else {
                debug!(event_name = "system.sessions.sweep", "no idle sessions");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, Utc};
    use gradedesk_core::domain::identity::Identity;
    use gradedesk_core::flows::DialogueState;
    use gradedesk_core::sessions::SessionStore;

    use super::spawn;

    #[tokio::test]
    async fn disabled_ttl_spawns_nothing() {
        assert!(spawn(Arc::new(SessionStore::new()), Duration::from_millis(5)).is_none());
    }

    #[tokio::test]
    async fn sweeper_evicts_stale_sessions_and_keeps_fresh_ones() {
        let sessions = Arc::new(SessionStore::with_idle_ttl_secs(60));
        let stale_at = Utc::now() - ChronoDuration::hours(2);
        sessions.lock_at(Identity(1), stale_at).await.replace(DialogueState::admin_menu());
        sessions.lock(Identity(2)).await.replace(DialogueState::admin_menu());
        assert_eq!(sessions.active_count().await, 2);

        let handle = spawn(Arc::clone(&sessions), Duration::from_millis(5)).expect("sweeper");
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(sessions.active_count().await, 1);
        assert!(sessions.lock(Identity(2)).await.current().is_some());
    }
}
