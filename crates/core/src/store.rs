// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local store interface consumed by the sync engine.
//!
//! The engine treats the local cache as a transactional row store. All
//! writes for one update happen inside a single [`StoreTxn`]; dropping a
//! transaction without calling [`StoreTxn::commit`] rolls it back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::BucketKey;
use crate::error::Result;
use crate::ids::{MessageId, PeerId};
use crate::update::Message;

/// Per-peer dialog counters and flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub peer: PeerId,
    pub unread_count: u32,
    /// Highest message id the user has read. `None` until the first read.
    pub read_inbox_max_id: Option<MessageId>,
    pub unread_mark: bool,
    pub pinned: bool,
    pub archived: bool,
}

impl Dialog {
    /// Creates an empty dialog with nothing read.
    pub fn new(peer: PeerId) -> Self {
        Dialog {
            peer,
            unread_count: 0,
            read_inbox_max_id: None,
            unread_mark: false,
            pinned: false,
            archived: false,
        }
    }

    /// Returns true if a message with this id lies above the read cursor.
    pub fn is_unread(&self, id: MessageId) -> bool {
        self.read_inbox_max_id.is_none_or(|max| id > max)
    }
}

/// A durable per-bucket high-water mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCursor {
    pub bucket: BucketKey,
    pub sequence: i64,
    pub date: DateTime<Utc>,
}

/// Row-level operations available inside a transaction.
pub trait StoreTxn {
    /// Inserts a message. Returns false (and changes nothing) if a message
    /// with the same peer and id already exists.
    fn insert_message(&mut self, message: &Message) -> Result<bool>;

    /// Replaces a message's text. Returns false if the message is unknown.
    fn update_message_text(
        &mut self,
        peer: PeerId,
        id: MessageId,
        text: Option<&str>,
    ) -> Result<bool>;

    /// Removes a message, returning the removed row if it existed.
    fn delete_message(&mut self, peer: PeerId, id: MessageId) -> Result<Option<Message>>;

    /// Reads a dialog.
    fn dialog(&self, peer: PeerId) -> Result<Option<Dialog>>;

    /// Inserts or replaces a dialog.
    fn put_dialog(&mut self, dialog: &Dialog) -> Result<()>;

    /// Inserts or replaces a settings document.
    fn put_setting(&mut self, key: &str, value: &serde_json::Value) -> Result<()>;

    /// Records a bucket high-water mark. Never moves a cursor backwards.
    fn put_cursor(&mut self, bucket: &BucketKey, sequence: i64, date: DateTime<Utc>)
        -> Result<()>;

    /// Commits all writes made through this transaction.
    fn commit(self) -> Result<()>
    where
        Self: Sized;
}

/// A transactional local store.
pub trait Store: Send {
    type Txn<'a>: StoreTxn
    where
        Self: 'a;

    /// Begins a transaction. It rolls back unless committed.
    fn begin(&mut self) -> Result<Self::Txn<'_>>;

    /// Loads every persisted bucket cursor.
    fn load_cursors(&self) -> Result<Vec<StoredCursor>>;

    /// Removes all sync-derived state: messages, dialogs, settings, cursors.
    fn reset(&mut self) -> Result<()>;
}
