/**
 * PostgreSQL Store Implementations
 *
 * sqlx-backed implementations of the durable collaborator interfaces.
 * Messages keep their millisecond timestamps as BIGINT so pagination
 * cursors compare without timezone conversion.
 */
use crate::backend::store::{MessageStore, StoreError, UnreadLedger, UserDirectory};
use crate::shared::user::BROADCAST_USERNAME;
use crate::shared::{Message, MessageKind, Peer, User};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// User directory persisted in the `users` table
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    username: String,
    firstname: String,
    lastname: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            username: row.username,
            firstname: row.firstname,
            lastname: row.lastname,
        }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT username, firstname, lastname FROM users",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT username, firstname, lastname FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (username, firstname, lastname)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO UPDATE SET
                firstname = EXCLUDED.firstname,
                lastname = EXCLUDED.lastname
            "#,
        )
        .bind(&user.username)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, username: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Message log persisted in the `messages` table
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_username: String,
    sender_presentation: String,
    receiver_username: String,
    body: String,
    date: i64,
    is_text: bool,
    attachment_id: Option<Uuid>,
    preview_id: Option<Uuid>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        let kind = if self.is_text {
            MessageKind::Text
        } else {
            MessageKind::File {
                // A file row without an attachment id cannot be produced by
                // append; treat it as a nil reference rather than failing.
                attachment: self.attachment_id.unwrap_or_else(Uuid::nil),
                preview: self.preview_id,
            }
        };
        Message {
            id: self.id,
            sender_username: self.sender_username,
            sender_presentation: self.sender_presentation,
            receiver_username: self.receiver_username,
            body: self.body,
            date: self.date,
            kind,
        }
    }
}

const MESSAGE_COLUMNS: &str = "id, sender_username, sender_presentation, receiver_username, \
                               body, date, is_text, attachment_id, preview_id";

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        let (is_text, attachment_id, preview_id) = match &message.kind {
            MessageKind::Text => (true, None, None),
            MessageKind::File { attachment, preview } => (false, Some(*attachment), *preview),
        };
        sqlx::query(
            r#"
            INSERT INTO messages (id, sender_username, sender_presentation, receiver_username,
                                  body, date, is_text, attachment_id, preview_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(message.id)
        .bind(&message.sender_username)
        .bind(&message.sender_presentation)
        .bind(&message.receiver_username)
        .bind(&message.body)
        .bind(message.date)
        .bind(is_text)
        .bind(attachment_id)
        .bind(preview_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MessageRow::into_message))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_page(
        &self,
        viewer: &str,
        peer: &Peer,
        before: i64,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = match peer {
            Peer::Broadcast => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS} FROM messages
                    WHERE receiver_username = $1 AND date < $2
                    ORDER BY date DESC
                    LIMIT $3
                    "#,
                ))
                .bind(BROADCAST_USERNAME)
                .bind(before)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
            Peer::User(peer_username) => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS} FROM messages
                    WHERE date < $3
                      AND ((sender_username = $1 AND receiver_username = $2)
                        OR (sender_username = $2 AND receiver_username = $1))
                    ORDER BY date DESC
                    LIMIT $4
                    "#,
                ))
                .bind(viewer)
                .bind(peer_username)
                .bind(before)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn find_all_involving(&self, username: &str) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE sender_username = $1 OR receiver_username = $1",
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }
}

/// Unread counters persisted in the `unread_counters` table
#[derive(Clone)]
pub struct PgUnreadLedger {
    pool: PgPool,
}

impl PgUnreadLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnreadLedger for PgUnreadLedger {
    async fn get(&self, viewer: &str, peer: &str) -> Result<u32, StoreError> {
        let count: Option<i32> = sqlx::query_scalar(
            "SELECT count FROM unread_counters \
             WHERE viewer_username = $1 AND peer_username = $2",
        )
        .bind(viewer)
        .bind(peer)
        .fetch_optional(&self.pool)
        .await?;
        Ok(count.unwrap_or(0).max(0) as u32)
    }

    async fn increment(&self, viewer: &str, peer: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO unread_counters (viewer_username, peer_username, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (viewer_username, peer_username) DO UPDATE SET
                count = unread_counters.count + 1
            "#,
        )
        .bind(viewer)
        .bind(peer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset(&self, viewer: &str, peer: &str) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM unread_counters \
             WHERE viewer_username = $1 AND peer_username = $2",
        )
        .bind(viewer)
        .bind(peer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_all_involving(&self, username: &str) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM unread_counters \
             WHERE viewer_username = $1 OR peer_username = $1",
        )
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
