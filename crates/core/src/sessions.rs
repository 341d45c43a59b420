//! Per-identity dialogue sessions.
//!
//! Each identity owns one slot guarded by its own async mutex, so one event
//! per identity is processed at a time while distinct identities proceed in
//! parallel. The slot map lock is only held long enough to find, create or
//! prune a slot, never across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::identity::Identity;
use crate::flows::DialogueState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub state: DialogueState,
    pub touched_at: DateTime<Utc>,
}

type Slot = Arc<Mutex<Option<Session>>>;
type SlotMap = Arc<SyncMutex<HashMap<Identity, Slot>>>;

/// `None` when `secs` is too large for a chrono duration.
pub(crate) fn ttl_from_secs(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

fn lock_map(
    slots: &SyncMutex<HashMap<Identity, Slot>>,
) -> MutexGuard<'_, HashMap<Identity, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct SessionStore {
    slots: SlotMap,
    idle_ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `idle_ttl_secs == 0` keeps sessions until they complete or are cancelled,
    /// as does a TTL too large to represent.
    pub fn with_idle_ttl_secs(idle_ttl_secs: u64) -> Self {
        let idle_ttl = Some(idle_ttl_secs).filter(|secs| *secs > 0).and_then(ttl_from_secs);
        Self { slots: SlotMap::default(), idle_ttl }
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }

    pub async fn lock(&self, identity: Identity) -> SessionGuard {
        self.lock_at(identity, Utc::now()).await
    }

    /// Waits for exclusive access to `identity`'s session. A session idle
    /// past the TTL as of `now` is discarded before the guard is returned.
    pub async fn lock_at(&self, identity: Identity, now: DateTime<Utc>) -> SessionGuard {
        let slot = self.slot(identity);
        let mut session = slot.lock_owned().await;

        let expired = match (&*session, self.idle_ttl) {
            (Some(current), Some(ttl)) => now - current.touched_at > ttl,
            _ => false,
        };
        if expired {
            *session = None;
        }

        SessionGuard { identity, session, now, expired, slots: Arc::clone(&self.slots) }
    }

    /// Drops sessions idle past the TTL and forgets slots nobody holds.
    /// Slots currently locked by an in-flight event are left alone.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut slots = lock_map(&self.slots);
        let mut evicted = 0;

        slots.retain(|_, slot| {
            let Ok(mut session) = slot.try_lock() else {
                return true;
            };
            let idle = match (&*session, self.idle_ttl) {
                (Some(current), Some(ttl)) => now - current.touched_at > ttl,
                _ => false,
            };
            if idle {
                *session = None;
                evicted += 1;
            }
            let unused = session.is_none() && Arc::strong_count(slot) == 1;
            !unused
        });

        evicted
    }

    /// Sessions currently open. Slots busy with an event count as open.
    pub async fn active_count(&self) -> usize {
        let slots = lock_map(&self.slots);
        slots
            .values()
            .filter(|slot| match slot.try_lock() {
                Ok(session) => session.is_some(),
                Err(_) => true,
            })
            .count()
    }

    fn slot(&self, identity: Identity) -> Slot {
        Arc::clone(lock_map(&self.slots).entry(identity).or_default())
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        lock_map(&self.slots).len()
    }
}

/// Exclusive handle on one identity's session for the duration of an event.
#[derive(Debug)]
pub struct SessionGuard {
    identity: Identity,
    session: OwnedMutexGuard<Option<Session>>,
    now: DateTime<Utc>,
    expired: bool,
    slots: SlotMap,
}

impl SessionGuard {
    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn current(&self) -> Option<&DialogueState> {
        self.session.as_ref().map(|session| &session.state)
    }

    /// True when an idle session was discarded while acquiring this guard.
    pub fn expired(&self) -> bool {
        self.expired
    }

    /// Installs `state`, discarding whatever was there before.
    pub fn replace(&mut self, state: DialogueState) {
        *self.session = Some(Session { state, touched_at: self.now });
    }

    pub fn clear(&mut self) -> Option<DialogueState> {
        self.session.take().map(|session| session.state)
    }

    /// Applies a settled follow-up: `Some` keeps the session, `None` ends it.
    pub fn settle(&mut self, next: Option<DialogueState>) {
        match next {
            Some(state) => self.replace(state),
            None => {
                self.clear();
            }
        }
    }

    /// Refreshes the idle clock without changing the state.
    pub fn touch(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.touched_at = self.now;
        }
    }
}

impl Drop for SessionGuard {
    /// Forgets the slot once no session is left in it and no other event is
    /// waiting on it. The map and this guard hold the only two references.
    fn drop(&mut self) {
        if self.session.is_some() {
            return;
        }
        let mut slots = lock_map(&self.slots);
        let unused = slots.get(&self.identity).is_some_and(|slot| Arc::strong_count(slot) == 2);
        if unused {
            slots.remove(&self.identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Utc};

    use super::SessionStore;
    use crate::domain::identity::Identity;
    use crate::flows::states::{BulkGradeStep, DialogueState, RegistrationStep};

    fn registration() -> DialogueState {
        DialogueState::Registration(RegistrationStep::AwaitingGivenName)
    }

    #[tokio::test]
    async fn replace_installs_latest_entry() {
        let store = SessionStore::new();
        let identity = Identity(42);

        let mut guard = store.lock(identity).await;
        guard.replace(registration());
        guard.replace(DialogueState::admin_menu());
        drop(guard);

        let guard = store.lock(identity).await;
        assert_eq!(guard.current(), Some(&DialogueState::admin_menu()));
    }

    #[tokio::test]
    async fn sessions_are_independent_per_identity() {
        let store = SessionStore::new();

        store.lock(Identity(1)).await.replace(registration());
        store.lock(Identity(2)).await.replace(DialogueState::admin_menu());

        assert_eq!(store.lock(Identity(1)).await.current(), Some(&registration()));
        assert_eq!(store.active_count().await, 2);

        store.lock(Identity(1)).await.settle(None);
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn lock_serializes_events_for_one_identity() {
        let store = Arc::new(SessionStore::new());
        let first = store.lock(Identity(9)).await;

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut guard = store.lock(Identity(9)).await;
                let seen = guard.current().cloned();
                guard.replace(DialogueState::admin_menu());
                seen
            })
        };

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!contender.is_finished());

        let mut first = first;
        first.replace(registration());
        drop(first);

        let seen = contender.await.expect("contender task");
        assert_eq!(seen, Some(registration()));
    }

    #[tokio::test]
    async fn idle_session_expires_on_next_access() {
        let store = SessionStore::with_idle_ttl_secs(60);
        let start = Utc::now();

        store.lock_at(Identity(5), start).await.replace(DialogueState::BulkGrades(
            BulkGradeStep::AwaitingGradeLines { course: "Math".to_owned(), saved: 3 },
        ));

        let guard = store.lock_at(Identity(5), start + Duration::seconds(30)).await;
        assert!(guard.current().is_some());
        drop(guard);

        let guard = store.lock_at(Identity(5), start + Duration::seconds(120)).await;
        assert!(guard.expired());
        assert_eq!(guard.current(), None);
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let store = SessionStore::with_idle_ttl_secs(0);
        let start = Utc::now();
        store.lock_at(Identity(5), start).await.replace(registration());

        let later = start + Duration::days(365);
        assert_eq!(store.evict_idle(later).await, 0);
        assert!(store.lock_at(Identity(5), later).await.current().is_some());
    }

    #[tokio::test]
    async fn sweeper_evicts_idle_sessions_and_skips_busy_slots() {
        let store = SessionStore::with_idle_ttl_secs(10);
        let start = Utc::now();

        store.lock_at(Identity(1), start).await.replace(registration());
        store.lock_at(Identity(2), start).await.replace(registration());

        let busy = store.lock_at(Identity(2), start).await;
        let evicted = store.evict_idle(start + Duration::seconds(11)).await;
        assert_eq!(evicted, 1);
        assert!(busy.current().is_some());
        drop(busy);

        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn one_off_identities_do_not_leave_slots_behind() {
        let store = SessionStore::new();

        for id in 0..1_000 {
            let guard = store.lock(Identity(id)).await;
            assert_eq!(guard.current(), None);
        }
        assert_eq!(store.slot_count(), 0);

        store.lock(Identity(7)).await.replace(registration());
        assert_eq!(store.slot_count(), 1);

        store.lock(Identity(7)).await.settle(None);
        assert_eq!(store.slot_count(), 0);
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn slot_survives_while_another_event_waits_on_it() {
        let store = Arc::new(SessionStore::new());
        let first = store.lock(Identity(3)).await;

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut guard = store.lock(Identity(3)).await;
                guard.replace(registration());
            })
        };
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        drop(first);
        waiter.await.expect("waiter task");

        assert_eq!(store.slot_count(), 1);
        assert_eq!(store.lock(Identity(3)).await.current(), Some(&registration()));
    }

    #[tokio::test]
    async fn oversized_ttl_is_treated_as_no_expiry() {
        let store = SessionStore::with_idle_ttl_secs(u64::MAX / 2);
        assert_eq!(store.idle_ttl(), None);

        let store = SessionStore::with_idle_ttl_secs(i64::MAX as u64);
        assert_eq!(store.idle_ttl(), None);

        let start = Utc::now();
        store.lock_at(Identity(4), start).await.replace(registration());
        assert!(store.lock_at(Identity(4), start + Duration::days(3650)).await.current().is_some());
    }
}
