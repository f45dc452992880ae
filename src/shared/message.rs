/**
 * Message Data Structure
 *
 * This module defines the Message struct persisted by the Message Store,
 * the text/file kind split, and the attachment descriptor handed to the
 * router when the external HTTP layer finishes an upload.
 */
use crate::shared::user::BROADCAST_USERNAME;
use crate::shared::util::human_readable_size;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The payload kind of a message
///
/// File messages reference the stored blob (and, for images, a preview
/// blob); deleting such a message cascades to those attachments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain chat text
    Text,
    /// A shared file; the body carries the human-readable label
    File {
        /// Stored blob reference
        attachment: Uuid,
        /// Thumbnail blob reference, present for image files
        preview: Option<Uuid>,
    },
}

/// A single chat message
///
/// Immutable once created except for deletion. The receiver is either a
/// concrete username or the broadcast marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Store-assigned identity
    pub id: Uuid,
    /// Username of the sending user
    pub sender_username: String,
    /// Display name of the sender at send time, kept for rendering
    pub sender_presentation: String,
    /// Username of the receiving user, or the broadcast marker
    pub receiver_username: String,
    /// Message text, or the file label for file messages
    pub body: String,
    /// Creation timestamp, unix milliseconds
    pub date: i64,
    pub kind: MessageKind,
}

impl Message {
    /// Create a text message addressed to `receiver`
    pub fn text(
        sender_username: impl Into<String>,
        sender_presentation: impl Into<String>,
        receiver_username: impl Into<String>,
        body: impl Into<String>,
        date: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_username: sender_username.into(),
            sender_presentation: sender_presentation.into(),
            receiver_username: receiver_username.into(),
            body: body.into(),
            date,
            kind: MessageKind::Text,
        }
    }

    /// Create a file message from an upload descriptor
    ///
    /// The body is the `"<name> (<size>)"` label shown in the conversation.
    pub fn file(
        sender_username: impl Into<String>,
        sender_presentation: impl Into<String>,
        receiver_username: impl Into<String>,
        descriptor: &FileDescriptor,
        date: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_username: sender_username.into(),
            sender_presentation: sender_presentation.into(),
            receiver_username: receiver_username.into(),
            body: descriptor.label(),
            date,
            kind: MessageKind::File {
                attachment: descriptor.attachment,
                preview: descriptor.preview,
            },
        }
    }

    /// True when addressed to every other user
    pub fn is_broadcast(&self) -> bool {
        self.receiver_username == BROADCAST_USERNAME
    }

    /// True for image files carrying a preview attachment
    pub fn has_preview(&self) -> bool {
        matches!(self.kind, MessageKind::File { preview: Some(_), .. })
    }
}

/// Metadata for an already-stored upload
///
/// Produced by the external upload handler; the router only consumes it to
/// build and fan out the referencing file message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Original file name
    pub name: String,
    /// Size in bytes
    pub length: u64,
    /// Stored blob reference
    pub attachment: Uuid,
    /// Thumbnail blob reference for image uploads
    pub preview: Option<Uuid>,
}

impl FileDescriptor {
    /// Human-readable label rendered as the message body
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, human_readable_size(self.length))
    }
}
