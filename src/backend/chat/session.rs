/**
 * Live Session Directory
 *
 * This module defines the in-memory table of live connections: one Session
 * per socket, indexed both by connection id and by username. It is the
 * single source of truth for "who is online and what are they looking at".
 *
 * The directory itself is plain data; the router guards it with its single
 * lock, so no method here blocks or calls back into routing logic.
 */
use crate::backend::error::RouterError;
use crate::shared::frame::Push;
use crate::shared::user::{Peer, User};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Opaque identity of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One live connection bound to an authenticated user
///
/// Holds the current viewed peer and a handle to the connection's outbound
/// queue. The handle is a back-reference to the transport, never the
/// session's identity: the directory keys sessions by connection id.
#[derive(Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub user: User,
    /// Current viewed peer; defaults to broadcast right after connecting
    pub peer: Peer,
    /// Unix milliseconds of the last inbound command
    pub last_activity: i64,
    outbound: UnboundedSender<Push>,
}

impl Session {
    pub fn new(
        connection_id: ConnectionId,
        user: User,
        outbound: UnboundedSender<Push>,
        now: i64,
    ) -> Self {
        Self {
            connection_id,
            user,
            peer: Peer::Broadcast,
            last_activity: now,
            outbound,
        }
    }

    /// Queue a push for this connection
    ///
    /// Fire-and-forget: the writer task drains the queue, no ack is awaited.
    /// Fails only when the socket side has already gone away.
    pub fn push(&self, push: Push) -> Result<(), RouterError> {
        self.outbound
            .send(push)
            .map_err(|_| RouterError::transport(self.user.username.clone()))
    }
}

/// In-memory table of live sessions with a username index
#[derive(Debug, Default)]
pub struct SessionDirectory {
    by_connection: HashMap<ConnectionId, Session>,
    by_username: HashMap<String, ConnectionId>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, evicting any prior session of the same username
    ///
    /// At most one live session exists per username; the evicted session is
    /// returned so the caller can signal it before it is dropped.
    pub fn register(&mut self, session: Session) -> Option<Session> {
        let evicted = self
            .by_username
            .get(&session.user.username)
            .copied()
            .and_then(|old| self.by_connection.remove(&old));
        self.by_username
            .insert(session.user.username.clone(), session.connection_id);
        self.by_connection.insert(session.connection_id, session);
        evicted
    }

    /// Remove a session by connection id; idempotent
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<Session> {
        let session = self.by_connection.remove(&connection_id)?;
        // Only clear the username index if it still points at this
        // connection; an evicted socket must not unmap its successor.
        if self.by_username.get(&session.user.username) == Some(&connection_id) {
            self.by_username.remove(&session.user.username);
        }
        Some(session)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Session> {
        self.by_connection.get(&connection_id)
    }

    pub fn get_mut(&mut self, connection_id: ConnectionId) -> Option<&mut Session> {
        self.by_connection.get_mut(&connection_id)
    }

    pub fn get_by_username(&self, username: &str) -> Option<&Session> {
        self.by_username
            .get(username)
            .and_then(|id| self.by_connection.get(id))
    }

    /// Iterate every live session, in no particular order
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.by_connection.values()
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.by_connection.values_mut()
    }

    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn session_for(username: &str) -> (Session, mpsc::UnboundedReceiver<Push>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let user = User::new(username, "Test", "User");
        (Session::new(ConnectionId::new(), user, tx, 0), rx)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut dir = SessionDirectory::new();
        let (session, _rx) = session_for("alice");
        let id = session.connection_id;
        assert!(dir.register(session).is_none());
        assert_eq!(dir.get(id).unwrap().user.username, "alice");
        assert_eq!(
            dir.get_by_username("alice").unwrap().connection_id,
            id
        );
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_register_evicts_same_username() {
        let mut dir = SessionDirectory::new();
        let (first, _rx1) = session_for("alice");
        let first_id = first.connection_id;
        dir.register(first);

        let (second, _rx2) = session_for("alice");
        let second_id = second.connection_id;
        let evicted = dir.register(second).unwrap();
        assert_eq!(evicted.connection_id, first_id);
        assert_eq!(dir.len(), 1);
        assert_eq!(
            dir.get_by_username("alice").unwrap().connection_id,
            second_id
        );
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut dir = SessionDirectory::new();
        let (session, _rx) = session_for("alice");
        let id = session.connection_id;
        dir.register(session);
        assert!(dir.unregister(id).is_some());
        assert!(dir.unregister(id).is_none());
        assert!(dir.get_by_username("alice").is_none());
    }

    #[test]
    fn test_stale_unregister_keeps_successor() {
        let mut dir = SessionDirectory::new();
        let (first, _rx1) = session_for("alice");
        let first_id = first.connection_id;
        dir.register(first);
        let (second, _rx2) = session_for("alice");
        dir.register(second);

        // The evicted socket disconnects later; alice must stay indexed.
        assert!(dir.unregister(first_id).is_none());
        assert!(dir.get_by_username("alice").is_some());
    }

    #[test]
    fn test_push_to_closed_queue_is_transport_error() {
        let (session, rx) = session_for("alice");
        drop(rx);
        let err = session.push(Push::Pong).unwrap_err();
        assert!(matches!(err, RouterError::Transport { .. }));
    }
}
