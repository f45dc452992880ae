/**
 * Cookie-Backed Auth Sessions
 *
 * This module holds the session records behind the `sid` cookie. The store
 * is shared with the external HTTP layer: that layer creates records and
 * attaches users at login; the WebSocket handler only resolves identity
 * through it. A background reaper sweeps records idle past the configured
 * threshold, independent of the routing lock.
 */
use crate::shared::user::User;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Name of the cookie carrying the auth-session id.
pub const SESSION_COOKIE: &str = "sid";

/// One cookie-backed session record
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Session id as carried by the cookie (lowercased)
    pub id: String,
    /// The logged-in user, if any
    pub user: Option<User>,
    /// Unix milliseconds of the last request seen on this session
    pub last_modified: i64,
}

/// In-memory table of auth sessions keyed by cookie id
pub struct AuthSessionStore {
    sessions: RwLock<HashMap<String, AuthSession>>,
    ttl: Duration,
}

impl AuthSessionStore {
    /// Create a store whose records expire after `ttl` of inactivity
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Look up a record by cookie id
    pub fn find(&self, id: &str) -> Option<AuthSession> {
        self.sessions.read().unwrap().get(&normalize(id)).cloned()
    }

    /// Install or replace a record
    pub fn save(&self, mut session: AuthSession) {
        session.id = normalize(&session.id);
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session);
    }

    /// Attach a logged-in user to a session, creating the record if needed
    ///
    /// This is the surface the external login handler drives.
    pub fn login(&self, id: &str, user: User) {
        let id = normalize(id);
        let mut sessions = self.sessions.write().unwrap();
        let entry = sessions.entry(id.clone()).or_insert_with(|| AuthSession {
            id,
            user: None,
            last_modified: now_millis(),
        });
        entry.user = Some(user);
        entry.last_modified = now_millis();
    }

    /// Drop a record; idempotent
    pub fn delete(&self, id: &str) {
        self.sessions.write().unwrap().remove(&normalize(id));
    }

    /// Refresh a record's last-activity timestamp
    pub fn touch(&self, id: &str) {
        if let Some(session) = self.sessions.write().unwrap().get_mut(&normalize(id)) {
            session.last_modified = now_millis();
        }
    }

    /// Remove every record idle longer than the TTL, returning the count
    pub fn purge_expired(&self) -> usize {
        let cutoff = now_millis() - self.ttl.as_millis() as i64;
        let mut sessions = self.sessions.write().unwrap();
        let before = sessions.len();
        sessions.retain(|_, session| session.last_modified >= cutoff);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().unwrap().is_empty()
    }
}

fn normalize(id: &str) -> String {
    id.to_lowercase()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AuthSessionStore {
        AuthSessionStore::new(Duration::from_secs(3600))
    }

    #[test]
    fn test_login_creates_record() {
        let store = store();
        store.login("ABC", User::new("alice", "Alice", "Smith"));
        let session = store.find("abc").unwrap();
        assert_eq!(session.user.unwrap().username, "alice");
    }

    #[test]
    fn test_find_missing() {
        assert!(store().find("nope").is_none());
    }

    #[test]
    fn test_save_normalizes_id() {
        let store = store();
        store.save(AuthSession {
            id: "MiXeD".to_string(),
            user: None,
            last_modified: 0,
        });
        assert!(store.find("mixed").is_some());
    }

    #[test]
    fn test_purge_expired_keeps_active_records() {
        let store = store();
        store.save(AuthSession {
            id: "stale".to_string(),
            user: None,
            last_modified: 0,
        });
        store.login("fresh", User::new("alice", "Alice", "Smith"));

        assert_eq!(store.purge_expired(), 1);
        assert!(store.find("stale").is_none());
        assert!(store.find("fresh").is_some());
    }

    #[test]
    fn test_touch_defers_expiry() {
        let store = store();
        store.save(AuthSession {
            id: "s".to_string(),
            user: None,
            last_modified: 0,
        });
        store.touch("s");
        assert_eq!(store.purge_expired(), 0);
    }
}
