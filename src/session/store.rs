//! Session records and the concurrent session store.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use uuid::Uuid;

use crate::security::authz::Role;
use crate::security::csrf::TokenEntry;
use crate::session::auth::PrincipalRecord;

/// Server-held record of an authenticated principal.
///
/// A session is either fully populated or absent from the store; callers
/// never observe a partially authenticated record.
#[derive(Debug, Clone)]
pub struct Session {
    /// Caller-held identifier (cookie value).
    pub id: Uuid,
    pub principal_id: u64,
    /// Fixed for the session's lifetime; re-authentication replaces the
    /// whole record.
    pub role: Role,
    pub display_name: String,
    pub email: String,
    pub logged_in_at: SystemTime,
    pub last_activity: SystemTime,
    /// Set once the identifier has been regenerated at login.
    pub initialized: bool,
    pub(crate) csrf_tokens: HashMap<String, TokenEntry>,
}

impl Session {
    /// Build a fresh session for a verified principal.
    pub fn new(principal: &PrincipalRecord, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id: principal.id,
            role: principal.role,
            display_name: principal.display_name.clone(),
            email: principal.email.clone(),
            logged_in_at: now,
            last_activity: now,
            initialized: true,
            csrf_tokens: HashMap::new(),
        }
    }
}

/// Result of the per-request activity touch.
#[derive(Debug)]
pub enum TouchOutcome {
    /// No session under that identifier.
    Absent,
    /// Idle past the lifetime; the session has been removed.
    Expired(Session),
    /// Still live; last-activity refreshed.
    Refreshed,
}

/// A thread-safe store of live sessions keyed by identifier.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: std::sync::Arc<DashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        self.inner.insert(session.id, session);
    }

    pub fn remove(&self, id: &Uuid) -> Option<Session> {
        self.inner.remove(id).map(|(_, s)| s)
    }

    /// Read fields off a live session.
    pub fn with<R>(&self, id: &Uuid, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.inner.get(id).map(|s| f(&s))
    }

    /// Mutate a live session under its entry guard.
    pub fn with_mut<R>(&self, id: &Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.inner.get_mut(id).map(|mut s| f(&mut s))
    }

    /// Apply the idle-timeout rule and refresh last-activity.
    ///
    /// This is the store's only expiry mechanism; it must run once per
    /// request that claims to be authenticated.
    pub fn touch_at(&self, id: &Uuid, now: SystemTime, lifetime: Duration) -> TouchOutcome {
        let expired = {
            let Some(mut entry) = self.inner.get_mut(id) else {
                return TouchOutcome::Absent;
            };
            let idle = now
                .duration_since(entry.last_activity)
                .unwrap_or(Duration::ZERO);
            if idle > lifetime {
                true
            } else {
                entry.last_activity = now;
                false
            }
        };

        if expired {
            // The guard is released; a concurrent touch may have removed it
            // first, which is the same outcome.
            match self.inner.remove(id) {
                Some((_, session)) => TouchOutcome::Expired(session),
                None => TouchOutcome::Absent,
            }
        } else {
            TouchOutcome::Refreshed
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> PrincipalRecord {
        PrincipalRecord {
            id: 7,
            username: "alice".into(),
            email: "alice@example.edu".into(),
            role: Role::Student,
            secret_hash: String::new(),
            display_name: "Alice".into(),
        }
    }

    #[test]
    fn test_insert_and_read() {
        let store = SessionStore::new();
        let session = Session::new(&principal(), SystemTime::now());
        let id = session.id;
        store.insert(session);

        assert_eq!(store.with(&id, |s| s.principal_id), Some(7));
        assert_eq!(store.with(&id, |s| s.role), Some(Role::Student));
        assert!(store.with(&id, |s| s.initialized).unwrap());
    }

    #[test]
    fn test_remove_destroys() {
        let store = SessionStore::new();
        let session = Session::new(&principal(), SystemTime::now());
        let id = session.id;
        store.insert(session);

        assert!(store.remove(&id).is_some());
        assert!(store.with(&id, |_| ()).is_none());
        assert!(store.remove(&id).is_none());
    }

    #[test]
    fn test_touch_refreshes_activity() {
        let store = SessionStore::new();
        let start = SystemTime::now();
        let session = Session::new(&principal(), start);
        let id = session.id;
        store.insert(session);

        let later = start + Duration::from_secs(10);
        let outcome = store.touch_at(&id, later, Duration::from_secs(1800));
        assert!(matches!(outcome, TouchOutcome::Refreshed));
        assert_eq!(store.with(&id, |s| s.last_activity), Some(later));
    }

    #[test]
    fn test_touch_expires_idle_session() {
        let store = SessionStore::new();
        let start = SystemTime::now();
        let session = Session::new(&principal(), start);
        let id = session.id;
        store.insert(session);

        let too_late = start + Duration::from_secs(1801);
        let outcome = store.touch_at(&id, too_late, Duration::from_secs(1800));
        assert!(matches!(outcome, TouchOutcome::Expired(_)));
        assert!(store.with(&id, |_| ()).is_none());
    }

    #[test]
    fn test_touch_absent() {
        let store = SessionStore::new();
        let outcome = store.touch_at(&Uuid::new_v4(), SystemTime::now(), Duration::from_secs(60));
        assert!(matches!(outcome, TouchOutcome::Absent));
    }
}
