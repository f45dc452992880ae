/**
 * In-Memory Store Implementations
 *
 * Process-local implementations of the collaborator interfaces. They back
 * the unit tests and keep the server usable when no DATABASE_URL is
 * configured (nothing survives a restart in that mode).
 */
use crate::backend::store::{
    AttachmentStore, MessageStore, StoreError, UnreadLedger, UserDirectory,
};
use crate::shared::user::BROADCAST_USERNAME;
use crate::shared::{Message, Peer, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// User directory held in a map keyed by username
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().unwrap().values().cloned().collect())
    }

    async fn find(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().unwrap().get(username).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        self.users
            .write()
            .unwrap()
            .insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn remove(&self, username: &str) -> Result<(), StoreError> {
        self.users.write().unwrap().remove(username);
        Ok(())
    }
}

/// Message log held in an append-ordered vector
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        self.messages.write().unwrap().push(message.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        Ok(self
            .messages
            .read()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.messages.write().unwrap().retain(|m| m.id != id);
        Ok(())
    }

    async fn fetch_page(
        &self,
        viewer: &str,
        peer: &Peer,
        before: i64,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.read().unwrap();
        let mut page: Vec<Message> = messages
            .iter()
            .filter(|m| m.date < before)
            .filter(|m| match peer {
                Peer::Broadcast => m.receiver_username == BROADCAST_USERNAME,
                Peer::User(peer_username) => {
                    (m.sender_username == viewer && m.receiver_username == *peer_username)
                        || (m.sender_username == *peer_username && m.receiver_username == viewer)
                }
            })
            .cloned()
            .collect();
        page.sort_by(|a, b| b.date.cmp(&a.date));
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn find_all_involving(&self, username: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .messages
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.sender_username == username || m.receiver_username == username)
            .cloned()
            .collect())
    }
}

/// Unread counters held in a map keyed by the directed pair
#[derive(Default)]
pub struct MemoryUnreadLedger {
    counters: RwLock<HashMap<(String, String), u32>>,
}

impl MemoryUnreadLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnreadLedger for MemoryUnreadLedger {
    async fn get(&self, viewer: &str, peer: &str) -> Result<u32, StoreError> {
        Ok(self
            .counters
            .read()
            .unwrap()
            .get(&(viewer.to_string(), peer.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn increment(&self, viewer: &str, peer: &str) -> Result<(), StoreError> {
        *self
            .counters
            .write()
            .unwrap()
            .entry((viewer.to_string(), peer.to_string()))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn reset(&self, viewer: &str, peer: &str) -> Result<(), StoreError> {
        self.counters
            .write()
            .unwrap()
            .remove(&(viewer.to_string(), peer.to_string()));
        Ok(())
    }

    async fn purge_all_involving(&self, username: &str) -> Result<(), StoreError> {
        self.counters
            .write()
            .unwrap()
            .retain(|(viewer, peer), _| viewer != username && peer != username);
        Ok(())
    }
}

/// Attachment store that only records deletions
///
/// Stands in for the blob store in tests and database-less mode; the
/// recorded ids let tests assert the deletion cascade ran.
#[derive(Default)]
pub struct MemoryAttachmentStore {
    deleted: RwLock<Vec<Uuid>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids deleted so far, in call order
    pub fn deleted(&self) -> Vec<Uuid> {
        self.deleted.read().unwrap().clone()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn delete(&self, attachment: Uuid) -> Result<(), StoreError> {
        self.deleted.write().unwrap().push(attachment);
        Ok(())
    }
}
