// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Apply update envelopes to the local store.
//!
//! Each envelope is applied inside one transaction together with its bucket
//! cursor, so a crash mid-apply never leaves a message inserted without its
//! dialog counters (or a cursor past a change that was not written).
//!
//! Apply rules:
//! - NewMessage: insert is idempotent on (peer, id); the unread count is
//!   bumped only for a newly inserted incoming message above the read cursor
//! - DeleteMessages: removing an unread incoming message decrements the
//!   unread count; replays remove nothing
//! - ReadMaxId: the read cursor only moves forward
//! - EditMessage/MarkAsUnread/DialogArchived/DialogPinned/UserSettings:
//!   last writer wins
//!
//! Storage failures never propagate as errors. They come back as
//! [`ApplyOutcome::Skipped`] so the caller can leave its sequence untouched
//! and retry on the next fetch.

use chrono::{DateTime, Utc};

use crate::bucket::BucketKey;
use crate::error::Result;
use crate::ids::PeerId;
use crate::store::{Dialog, Store, StoreTxn};
use crate::update::{Update, UpdateEnvelope};

/// Settings key for the account-wide settings document.
pub const USER_SETTINGS_KEY: &str = "user";

/// Why an update was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The local transaction failed and was rolled back.
    Storage(String),
}

/// Result of applying a single envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// All writes committed, including the bucket cursor.
    Applied,
    /// Nothing was written.
    Skipped(SkipReason),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// Trait for applying updates transactionally.
pub trait Apply {
    /// Applies an envelope's payload and advances its bucket cursor.
    fn apply_update(&mut self, envelope: &UpdateEnvelope) -> ApplyOutcome;

    /// Advances a bucket cursor without applying any payload.
    ///
    /// Used when adopting a server baseline or when a fetched range ends
    /// beyond its last update.
    fn record_cursor(&mut self, bucket: &BucketKey, sequence: i64, date: DateTime<Utc>)
        -> Result<()>;
}

impl<S: Store> Apply for S {
    fn apply_update(&mut self, envelope: &UpdateEnvelope) -> ApplyOutcome {
        match apply_in_txn(self, envelope) {
            Ok(()) => ApplyOutcome::Applied,
            Err(e) => {
                tracing::warn!(
                    bucket = %envelope.bucket,
                    sequence = envelope.sequence,
                    kind = envelope.payload.kind(),
                    "apply failed: {}",
                    e
                );
                ApplyOutcome::Skipped(SkipReason::Storage(e.to_string()))
            }
        }
    }

    fn record_cursor(
        &mut self,
        bucket: &BucketKey,
        sequence: i64,
        date: DateTime<Utc>,
    ) -> Result<()> {
        let mut txn = self.begin()?;
        txn.put_cursor(bucket, sequence, date)?;
        txn.commit()
    }
}

fn apply_in_txn<S: Store>(store: &mut S, envelope: &UpdateEnvelope) -> Result<()> {
    let mut txn = store.begin()?;
    apply_payload(&mut txn, &envelope.payload)?;
    txn.put_cursor(&envelope.bucket, envelope.sequence, envelope.date)?;
    txn.commit()
}

fn load_dialog<T: StoreTxn>(txn: &T, peer: PeerId) -> Result<Dialog> {
    Ok(txn.dialog(peer)?.unwrap_or_else(|| Dialog::new(peer)))
}

fn apply_payload<T: StoreTxn>(txn: &mut T, update: &Update) -> Result<()> {
    match update {
        Update::NewMessage { message } => {
            let inserted = txn.insert_message(message)?;
            let mut dialog = load_dialog(txn, message.peer)?;
            if inserted && !message.out && dialog.is_unread(message.id) {
                dialog.unread_count = dialog.unread_count.saturating_add(1);
            }
            txn.put_dialog(&dialog)
        }

        Update::EditMessage {
            peer,
            message_id,
            text,
        } => {
            // Unknown message: the edit has nothing to land on
            txn.update_message_text(*peer, *message_id, text.as_deref())?;
            Ok(())
        }

        Update::DeleteMessages { peer, message_ids } => {
            let Some(mut dialog) = txn.dialog(*peer)? else {
                for id in message_ids {
                    txn.delete_message(*peer, *id)?;
                }
                return Ok(());
            };
            for id in message_ids {
                if let Some(removed) = txn.delete_message(*peer, *id)? {
                    if !removed.out && dialog.is_unread(removed.id) {
                        dialog.unread_count = dialog.unread_count.saturating_sub(1);
                    }
                }
            }
            txn.put_dialog(&dialog)
        }

        Update::ReadMaxId {
            peer,
            read_max_id,
            unread_count,
        } => {
            let mut dialog = load_dialog(txn, *peer)?;
            let advances = dialog
                .read_inbox_max_id
                .is_none_or(|current| *read_max_id > current);
            if !advances {
                return Ok(());
            }
            dialog.read_inbox_max_id = Some(*read_max_id);
            dialog.unread_count = *unread_count;
            dialog.unread_mark = false;
            txn.put_dialog(&dialog)
        }

        Update::MarkAsUnread { peer, unread_mark } => {
            let mut dialog = load_dialog(txn, *peer)?;
            dialog.unread_mark = *unread_mark;
            txn.put_dialog(&dialog)
        }

        Update::DialogArchived { peer, archived } => {
            let mut dialog = load_dialog(txn, *peer)?;
            dialog.archived = *archived;
            txn.put_dialog(&dialog)
        }

        Update::DialogPinned { peer, pinned } => {
            let mut dialog = load_dialog(txn, *peer)?;
            dialog.pinned = *pinned;
            txn.put_dialog(&dialog)
        }

        Update::UserSettings { settings } => txn.put_setting(USER_SETTINGS_KEY, settings),
    }
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod tests;
