// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Update envelopes and the domain update payloads they carry.
//!
//! Every server-side change reaches the client as an [`UpdateEnvelope`]:
//! a payload stamped with the bucket it belongs to, its sequence number in
//! that bucket, and the server time it was produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::BucketKey;
use crate::ids::{MessageId, PeerId};

/// A chat message as delivered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub peer: PeerId,
    pub from_id: i64,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Sent by the current user. Outgoing messages never count as unread.
    #[serde(default)]
    pub out: bool,
}

/// Payload describing a single server-side change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Update {
    /// A message was posted.
    NewMessage { message: Message },

    /// A message's text changed.
    EditMessage {
        peer: PeerId,
        message_id: MessageId,
        text: Option<String>,
    },

    /// Messages were removed from a chat.
    DeleteMessages {
        peer: PeerId,
        message_ids: Vec<MessageId>,
    },

    /// The read cursor of a dialog moved (read on another device).
    ReadMaxId {
        peer: PeerId,
        read_max_id: MessageId,
        unread_count: u32,
    },

    /// The dialog was manually flagged (or unflagged) as unread.
    MarkAsUnread { peer: PeerId, unread_mark: bool },

    /// The dialog was archived or unarchived.
    DialogArchived { peer: PeerId, archived: bool },

    /// The dialog was pinned or unpinned.
    DialogPinned { peer: PeerId, pinned: bool },

    /// Account settings were replaced.
    UserSettings { settings: serde_json::Value },
}

impl Update {
    /// Returns a short stable name for logging and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Update::NewMessage { .. } => "new_message",
            Update::EditMessage { .. } => "edit_message",
            Update::DeleteMessages { .. } => "delete_messages",
            Update::ReadMaxId { .. } => "read_max_id",
            Update::MarkAsUnread { .. } => "mark_as_unread",
            Update::DialogArchived { .. } => "dialog_archived",
            Update::DialogPinned { .. } => "dialog_pinned",
            Update::UserSettings { .. } => "user_settings",
        }
    }

    /// Returns the dialog this update touches, if any.
    pub fn peer(&self) -> Option<PeerId> {
        match self {
            Update::NewMessage { message } => Some(message.peer),
            Update::EditMessage { peer, .. }
            | Update::DeleteMessages { peer, .. }
            | Update::ReadMaxId { peer, .. }
            | Update::MarkAsUnread { peer, .. }
            | Update::DialogArchived { peer, .. }
            | Update::DialogPinned { peer, .. } => Some(*peer),
            Update::UserSettings { .. } => None,
        }
    }
}

/// An update stamped with its position in a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    pub bucket: BucketKey,
    /// Server-assigned position within `bucket`.
    pub sequence: i64,
    /// Server time the update was produced. Informational only.
    pub date: DateTime<Utc>,
    pub payload: Update,
}

impl UpdateEnvelope {
    pub fn new(bucket: BucketKey, sequence: i64, date: DateTime<Utc>, payload: Update) -> Self {
        UpdateEnvelope {
            bucket,
            sequence,
            date,
            payload,
        }
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
