//! Store Module
//!
//! Abstract interfaces for the router's durable collaborators and their
//! implementations. The routing core only ever talks to these traits; the
//! concrete backends are wired up at startup.
//!
//! # Implementations
//!
//! - **`pg`** - PostgreSQL-backed directory, message store and unread ledger
//! - **`memory`** - in-process implementations, used in tests and as the
//!   fallback when no database is configured
//! - **`fs`** - attachment blobs on the local filesystem

use crate::shared::{Message, Peer, User};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Database operations
pub mod pg;

/// In-memory implementations
pub mod memory;

/// Filesystem attachment store
pub mod fs;

/// Errors surfaced by any store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Attachment blob I/O error
    #[error("attachment store error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered list of known users, including the broadcast pseudo-user
///
/// Accounts are created and deleted by the external HTTP layer; the router
/// only reads existence.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All known users, in no particular order
    async fn list_all(&self) -> Result<Vec<User>, StoreError>;

    /// Look up one user by normalized username
    async fn find(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Add a user; replaces an existing row with the same username
    async fn insert(&self, user: &User) -> Result<(), StoreError>;

    /// Remove a user; no-op when absent
    async fn remove(&self, username: &str) -> Result<(), StoreError>;
}

/// Durable append-only message log
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message
    async fn append(&self, message: &Message) -> Result<(), StoreError>;

    /// Look up one message by id
    async fn find(&self, id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Delete one message record; no-op when absent
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Fetch a page strictly older than `before`, newest first
    ///
    /// For `Peer::Broadcast` this is the merged log of all broadcast-addressed
    /// messages; for a direct peer it is both directions of the pair.
    async fn fetch_page(
        &self,
        viewer: &str,
        peer: &Peer,
        before: i64,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError>;

    /// Every message the user sent or received, for the account cascade
    async fn find_all_involving(&self, username: &str) -> Result<Vec<Message>, StoreError>;
}

/// Durable unread counters keyed by the directed (viewer, peer) pair
#[async_trait]
pub trait UnreadLedger: Send + Sync {
    /// Current count; absent records read as 0
    async fn get(&self, viewer: &str, peer: &str) -> Result<u32, StoreError>;

    /// Add one, creating the record when absent
    async fn increment(&self, viewer: &str, peer: &str) -> Result<(), StoreError>;

    /// Drop the record (reads as 0 afterwards); no-op when absent
    async fn reset(&self, viewer: &str, peer: &str) -> Result<(), StoreError>;

    /// Delete every record naming the user as viewer or peer
    async fn purge_all_involving(&self, username: &str) -> Result<(), StoreError>;
}

/// Attachment blob deletion, consumed by message and account cascades
///
/// Upload and download are owned by the external HTTP layer.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Delete a stored blob; deleting an absent blob is a no-op
    async fn delete(&self, attachment: Uuid) -> Result<(), StoreError>;
}
