/**
 * Message Router
 *
 * The stateful core of the system. Every inbound event (connect, command,
 * disconnect, file-sent notification, account-deletion cascade) runs under
 * the router's single fair lock for its entire logical operation: reading
 * presence, deciding push-vs-bump, mutating ledger and store, and queueing
 * the outbound pushes. Two near-simultaneous sends to the same idle peer
 * therefore cannot both pick the same outcome twice or lose an increment.
 *
 * Pushes are fire-and-forget: a recipient whose socket already closed is
 * logged and skipped, and fan-out continues to the remaining recipients.
 */
use crate::backend::chat::render::{RenderParams, Renderer, Template};
use crate::backend::chat::session::{ConnectionId, Session, SessionDirectory};
use crate::backend::error::RouterError;
use crate::backend::store::{AttachmentStore, MessageStore, UnreadLedger, UserDirectory};
use crate::shared::frame::{Command, Push};
use crate::shared::user::{normalize_username, Peer, User};
use crate::shared::util::format_timestamp;
use crate::shared::{FileDescriptor, Message, MessageKind};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Which history push a fetched page becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryKind {
    /// Full page after a peer switch
    Page,
    /// Older chunk loaded on scroll-back
    Load,
}

/// Presence-aware routing engine
///
/// Owns the live session directory and consumes the abstract store
/// collaborators. All public entry points are safe to call concurrently;
/// they serialize on the internal lock.
pub struct MessageRouter {
    users: Arc<dyn UserDirectory>,
    messages: Arc<dyn MessageStore>,
    unread: Arc<dyn UnreadLedger>,
    attachments: Arc<dyn AttachmentStore>,
    renderer: Arc<dyn Renderer>,
    /// Page size for history fetches
    chunk_size: u32,
    /// The single process-wide routing lock (FIFO acquisition order)
    state: Mutex<SessionDirectory>,
}

impl MessageRouter {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        messages: Arc<dyn MessageStore>,
        unread: Arc<dyn UnreadLedger>,
        attachments: Arc<dyn AttachmentStore>,
        renderer: Arc<dyn Renderer>,
        chunk_size: u32,
    ) -> Self {
        Self {
            users,
            messages,
            unread,
            attachments,
            renderer,
            chunk_size,
            state: Mutex::new(SessionDirectory::new()),
        }
    }

    /// Register a freshly authenticated connection
    ///
    /// Evicts any prior connection of the same username (it receives a
    /// forced redirect before removal), installs the new session viewing
    /// broadcast, and pushes the initial user list and broadcast history.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        user: User,
        outbound: UnboundedSender<Push>,
    ) -> Result<(), RouterError> {
        let mut dir = self.state.lock().await;
        let username = user.username.clone();
        let session = Session::new(connection_id, user, outbound, now_millis());
        if let Some(evicted) = dir.register(session) {
            tracing::info!(
                "[Router] evicting prior connection {} of '{}'",
                evicted.connection_id,
                username
            );
            log_push_failure(evicted.push(Push::Redirect("/".to_string())));
        }
        tracing::info!("[Router] '{}' connected as {}", username, connection_id);
        self.change_page_locked(&mut dir, connection_id, Peer::Broadcast)
            .await
    }

    /// Remove a closed connection; idempotent
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut dir = self.state.lock().await;
        if let Some(session) = dir.unregister(connection_id) {
            tracing::info!(
                "[Router] '{}' disconnected ({})",
                session.user.username,
                connection_id
            );
        }
    }

    /// Process one parsed inbound command
    ///
    /// Frames from a connection that raced its own eviction or disconnect
    /// are dropped silently.
    pub async fn handle(
        &self,
        connection_id: ConnectionId,
        command: Command,
    ) -> Result<(), RouterError> {
        let mut dir = self.state.lock().await;
        let Some(session) = dir.get_mut(connection_id) else {
            return Ok(());
        };
        session.last_activity = now_millis();
        let user = session.user.clone();
        let peer = session.peer.clone();

        match command {
            Command::Send { body } => {
                let message = Message::text(
                    &user.username,
                    user.presentation(),
                    peer.as_username(),
                    body,
                    now_millis(),
                );
                self.route_message_locked(&mut dir, message).await
            }
            Command::ChangePage { peer } => {
                self.change_page_locked(&mut dir, connection_id, peer).await
            }
            Command::DeleteMessage { id } => {
                self.delete_message_locked(&mut dir, &user.username, id).await
            }
            Command::LoadOlder { before } => {
                self.send_history_locked(&dir, connection_id, before, HistoryKind::Load)
                    .await
            }
            Command::Ping => {
                if let Some(session) = dir.get(connection_id) {
                    log_push_failure(session.push(Push::Pong));
                }
                Ok(())
            }
        }
    }

    /// Entry point for the external upload handler
    ///
    /// Builds a file message addressed to the sender's current viewed peer
    /// and routes it like any other send.
    pub async fn notify_file_sent(
        &self,
        sender_username: &str,
        descriptor: FileDescriptor,
    ) -> Result<(), RouterError> {
        let sender_username = normalize_username(sender_username);
        let mut dir = self.state.lock().await;
        let Some(session) = dir.get_by_username(&sender_username) else {
            return Err(RouterError::not_found(format!(
                "no live session for '{sender_username}'"
            )));
        };
        let user = session.user.clone();
        let peer = session.peer.clone();
        let message = Message::file(
            &user.username,
            user.presentation(),
            peer.as_username(),
            &descriptor,
            now_millis(),
        );
        self.route_message_locked(&mut dir, message).await
    }

    /// Entry point for the external account-deletion handler
    ///
    /// Runs the whole cascade as one unit under the routing lock so no
    /// session can observe a half-purged state: forced logout, message and
    /// attachment purge, ledger purge, viewed-peer fallback, list refresh.
    pub async fn notify_account_deleted(&self, username: &str) -> Result<(), RouterError> {
        let username = normalize_username(username);
        let mut dir = self.state.lock().await;

        // (1) force the user's own connection out, if any
        if let Some(session) = dir.get_by_username(&username) {
            let doomed = session.connection_id;
            log_push_failure(session.push(Push::Redirect("/".to_string())));
            dir.unregister(doomed);
            tracing::info!("[Router] forced logout of deleted account '{}'", username);
        }

        // (2) purge messages, cascading attachment blobs per file message
        let doomed = self.messages.find_all_involving(&username).await?;
        tracing::info!(
            "[Router] deleting {} messages involving '{}'",
            doomed.len(),
            username
        );
        for message in doomed {
            self.delete_attachments(&message).await;
            self.messages.delete(message.id).await?;
        }

        // (3) unread counters, both as viewer and as peer
        self.unread.purge_all_involving(&username).await?;

        // (4) sessions still viewing the removed user fall back to broadcast
        for session in dir.sessions_mut() {
            if session.peer.is_user(&username) {
                session.peer = Peer::Broadcast;
            }
        }

        // (5) everyone sees the shrunken directory
        self.refresh_all_user_lists(&mut dir).await
    }

    /// Push a fresh user list to every live session
    ///
    /// Called by the external layer after the directory changed (e.g. a
    /// signup) and by the tail of the account cascade.
    pub async fn notify_directory_changed(&self) -> Result<(), RouterError> {
        let mut dir = self.state.lock().await;
        self.refresh_all_user_lists(&mut dir).await
    }

    /// Number of live connections, for diagnostics
    pub async fn live_sessions(&self) -> usize {
        self.state.lock().await.len()
    }

    async fn change_page_locked(
        &self,
        dir: &mut SessionDirectory,
        connection_id: ConnectionId,
        requested: Peer,
    ) -> Result<(), RouterError> {
        // A stale peer (user deleted mid-flight) falls back to broadcast
        // instead of failing the switch.
        let peer = match &requested {
            Peer::Broadcast => Peer::Broadcast,
            Peer::User(username) => {
                if self.users.find(username).await?.is_some() {
                    requested.clone()
                } else {
                    tracing::warn!(
                        "[Router] viewed peer '{}' no longer exists, falling back to broadcast",
                        username
                    );
                    Peer::Broadcast
                }
            }
        };

        let Some(session) = dir.get_mut(connection_id) else {
            return Ok(());
        };
        session.peer = peer.clone();
        let username = session.user.username.clone();

        let list = self.user_list_fragment(&username, &peer).await?;
        if let Some(session) = dir.get(connection_id) {
            log_push_failure(session.push(Push::Users(list)));
        }
        self.send_history_locked(dir, connection_id, now_millis(), HistoryKind::Page)
            .await?;
        self.unread.reset(&username, peer.as_username()).await?;
        Ok(())
    }

    async fn send_history_locked(
        &self,
        dir: &SessionDirectory,
        connection_id: ConnectionId,
        before: i64,
        kind: HistoryKind,
    ) -> Result<(), RouterError> {
        let Some(session) = dir.get(connection_id) else {
            return Ok(());
        };
        let username = session.user.username.clone();
        let peer = session.peer.clone();

        let mut page = self
            .messages
            .fetch_page(&username, &peer, before, self.chunk_size)
            .await?;
        let full_page = self.chunk_size > 0 && page.len() == self.chunk_size as usize;
        // Fetched newest-first, delivered in chronological order
        page.reverse();

        let mut fragment = String::new();
        for message in &page {
            fragment.push_str(&self.render_message(message, message.sender_username == username));
        }
        let push = match kind {
            HistoryKind::Page => Push::Page(fragment),
            HistoryKind::Load => Push::Load(fragment),
        };
        if let Some(session) = dir.get(connection_id) {
            log_push_failure(session.push(push));
            if full_page {
                log_push_failure(session.push(Push::CheckForLoadingMore));
            }
        }
        Ok(())
    }

    /// Persist a message, echo it to the sender, then fan out
    async fn route_message_locked(
        &self,
        dir: &mut SessionDirectory,
        message: Message,
    ) -> Result<(), RouterError> {
        self.messages.append(&message).await?;

        if let Some(sender_session) = dir.get_by_username(&message.sender_username) {
            let self_fragment = self.render_message(&message, true);
            log_push_failure(sender_session.push(Push::Msg(self_fragment)));
        }
        self.fan_out(dir, &message).await
    }

    /// Deliver one message to every eligible recipient exactly once
    ///
    /// A recipient actively viewing the right conversation gets the message
    /// fragment; everyone else gets an unread bump, plus a list refresh when
    /// live. No recipient ever gets both, and a dead socket never stops the
    /// remaining deliveries.
    async fn fan_out(&self, dir: &SessionDirectory, message: &Message) -> Result<(), RouterError> {
        let other_fragment = self.render_message(message, false);
        if message.is_broadcast() {
            for user in self.users.list_all().await? {
                if user.username == message.sender_username || user.is_broadcast() {
                    continue;
                }
                self.deliver_or_bump(dir, &user.username, message, &other_fragment)
                    .await?;
            }
        } else if message.receiver_username != message.sender_username {
            self.deliver_or_bump(dir, &message.receiver_username, message, &other_fragment)
                .await?;
        }
        Ok(())
    }

    async fn deliver_or_bump(
        &self,
        dir: &SessionDirectory,
        recipient: &str,
        message: &Message,
        other_fragment: &str,
    ) -> Result<(), RouterError> {
        let session = dir.get_by_username(recipient);
        if let Some(session) = session {
            let viewing = if message.is_broadcast() {
                session.peer == Peer::Broadcast
            } else {
                session.peer.is_user(&message.sender_username)
            };
            if viewing {
                log_push_failure(session.push(Push::Msg(other_fragment.to_string())));
                return Ok(());
            }
        }

        self.unread
            .increment(recipient, &message.sender_username)
            .await?;
        if let Some(session) = session {
            let list = self.user_list_fragment(recipient, &session.peer).await?;
            log_push_failure(session.push(Push::Users(list)));
        }
        Ok(())
    }

    /// Delete a message and notify everyone who saw it rendered
    ///
    /// Only the message's sender may delete it; anything else reads as not
    /// found. The deletion notice reaches the same live recipients a fresh
    /// send of the message would push to; idle recipients never rendered
    /// it, and the coarse unread counters are left untouched.
    async fn delete_message_locked(
        &self,
        dir: &mut SessionDirectory,
        requester: &str,
        id: Uuid,
    ) -> Result<(), RouterError> {
        let Some(message) = self.messages.find(id).await? else {
            return Err(RouterError::not_found(format!("message {id}")));
        };
        if message.sender_username != requester {
            tracing::warn!(
                "[Router] '{}' tried to delete message {} sent by '{}'",
                requester,
                id,
                message.sender_username
            );
            return Err(RouterError::not_found(format!("message {id}")));
        }

        self.delete_attachments(&message).await;
        self.messages.delete(id).await?;

        if let Some(sender_session) = dir.get_by_username(&message.sender_username) {
            log_push_failure(sender_session.push(Push::DeleteMsg(id)));
        }
        for session in dir.sessions() {
            if session.user.username == message.sender_username {
                continue;
            }
            let saw_it_live = if message.is_broadcast() {
                session.peer == Peer::Broadcast
            } else {
                session.user.username == message.receiver_username
                    && session.peer.is_user(&message.sender_username)
            };
            if saw_it_live {
                log_push_failure(session.push(Push::DeleteMsg(id)));
            }
        }
        Ok(())
    }

    /// Best-effort attachment cleanup for a file message
    ///
    /// A missing blob must not block deleting the message record.
    async fn delete_attachments(&self, message: &Message) {
        if let MessageKind::File { attachment, preview } = &message.kind {
            if let Err(e) = self.attachments.delete(*attachment).await {
                tracing::warn!("[Router] failed to delete attachment {}: {}", attachment, e);
            }
            if let Some(preview) = preview {
                if let Err(e) = self.attachments.delete(*preview).await {
                    tracing::warn!("[Router] failed to delete preview {}: {}", preview, e);
                }
            }
        }
    }

    async fn refresh_all_user_lists(
        &self,
        dir: &mut SessionDirectory,
    ) -> Result<(), RouterError> {
        let targets: Vec<(ConnectionId, String, Peer)> = dir
            .sessions()
            .map(|s| (s.connection_id, s.user.username.clone(), s.peer.clone()))
            .collect();
        for (connection_id, username, peer) in targets {
            let list = self.user_list_fragment(&username, &peer).await?;
            if let Some(session) = dir.get(connection_id) {
                log_push_failure(session.push(Push::Users(list)));
            }
        }
        Ok(())
    }

    /// Build the user-list fragment as seen by `viewer`
    ///
    /// Broadcast pinned first, remaining users ordered by presentation; the
    /// active peer renders highlighted, everyone else carries the viewer's
    /// unread count for them.
    async fn user_list_fragment(&self, viewer: &str, active: &Peer) -> Result<String, RouterError> {
        let mut users = self.users.list_all().await?;
        users.sort();
        if let Some(pos) = users.iter().position(User::is_broadcast) {
            let broadcast = users.remove(pos);
            users.insert(0, broadcast);
        }

        let mut fragment = String::new();
        for user in &users {
            let mut params = RenderParams::new();
            params.insert("name", user.presentation());
            if user.username == active.as_username() {
                fragment.push_str(&self.renderer.render(Template::UserEntryActive, &params));
            } else {
                let count = self.unread.get(viewer, &user.username).await?;
                params.insert("username", user.username.clone());
                params.insert(
                    "count",
                    if count == 0 { String::new() } else { count.to_string() },
                );
                fragment.push_str(&self.renderer.render(Template::UserEntryPassive, &params));
            }
        }
        Ok(fragment)
    }

    fn render_message(&self, message: &Message, is_self: bool) -> String {
        let mut params = RenderParams::new();
        params.insert("id", message.id.to_string());
        params.insert("date", message.date.to_string());
        params.insert("date_str", format_timestamp(message.date));
        params.insert("body", message.body.clone());
        if let MessageKind::File { attachment, preview } = &message.kind {
            params.insert("attachment", attachment.to_string());
            if let Some(preview) = preview {
                params.insert("preview", preview.to_string());
            }
        }
        if is_self {
            self.renderer.render(Template::MessageSelf, &params)
        } else {
            params.insert("title", message.sender_presentation.clone());
            self.renderer.render(Template::MessageOther, &params)
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A push to a closed socket is contained to that recipient.
fn log_push_failure(result: Result<(), RouterError>) {
    if let Err(e) = result {
        tracing::warn!("[Router] dropping push: {}", e);
    }
}
