// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed local cache.
//!
//! The [`Database`] struct implements [`Store`] for the sync engine and
//! exposes read-only queries for diagnostics tooling.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

use crate::bucket::BucketKey;
use crate::error::{Error, Result};
use crate::ids::{MessageId, PeerId};
use crate::store::{Dialog, Store, StoreTxn, StoredCursor};
use crate::update::Message;

/// SQL schema for the local cache.
pub const SCHEMA: &str = r#"
-- Messages, keyed by peer and server message id
CREATE TABLE IF NOT EXISTS messages (
    peer TEXT NOT NULL,
    id INTEGER NOT NULL,
    from_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    text TEXT,
    out INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (peer, id)
);

-- Dialog counters and read cursors
CREATE TABLE IF NOT EXISTS dialogs (
    peer TEXT PRIMARY KEY,
    unread_count INTEGER NOT NULL DEFAULT 0,
    read_inbox_max_id INTEGER,
    unread_mark INTEGER NOT NULL DEFAULT 0,
    pinned INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    CHECK (unread_count >= 0)
);

-- Account settings documents (JSON)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Per-bucket high-water marks
CREATE TABLE IF NOT EXISTS bucket_cursors (
    bucket TEXT PRIMARY KEY,
    sequence INTEGER NOT NULL,
    date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_peer_date ON messages(peer, date);
CREATE INDEX IF NOT EXISTS idx_dialogs_pinned ON dialogs(pinned DESC);
"#;

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Message, rusqlite::Error> {
    let peer: String = row.get(0)?;
    let date: String = row.get(3)?;
    Ok(Message {
        peer: parse_db(&peer, "peer")?,
        id: MessageId(row.get(1)?),
        from_id: row.get(2)?,
        date: parse_timestamp(&date, "date")?,
        text: row.get(4)?,
        out: row.get(5)?,
    })
}

fn dialog_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Dialog, rusqlite::Error> {
    let peer: String = row.get(0)?;
    let unread: i64 = row.get(1)?;
    let read_max: Option<i64> = row.get(2)?;
    Ok(Dialog {
        peer: parse_db(&peer, "peer")?,
        unread_count: u32::try_from(unread).unwrap_or(0),
        read_inbox_max_id: read_max.map(MessageId),
        unread_mark: row.get(3)?,
        pinned: row.get(4)?,
        archived: row.get(5)?,
    })
}

const MESSAGE_COLUMNS: &str = "peer, id, from_id, date, text, out";
const DIALOG_COLUMNS: &str = "peer, unread_count, read_inbox_max_id, unread_mark, pinned, archived";

/// Apply the schema to a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// SQLite connection holding the local cache.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL so UI readers never block the sync writer
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Get a dialog by peer.
    pub fn get_dialog(&self, peer: PeerId) -> Result<Option<Dialog>> {
        let sql = format!("SELECT {DIALOG_COLUMNS} FROM dialogs WHERE peer = ?1");
        let dialog = self
            .conn
            .query_row(&sql, params![peer.to_string()], dialog_from_row)
            .optional()?;
        Ok(dialog)
    }

    /// List all dialogs, pinned first.
    pub fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        let sql = format!("SELECT {DIALOG_COLUMNS} FROM dialogs ORDER BY pinned DESC, peer");
        let mut stmt = self.conn.prepare(&sql)?;
        let dialogs = stmt
            .query_map([], dialog_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(dialogs)
    }

    /// Get a message by peer and id.
    pub fn get_message(&self, peer: PeerId, id: MessageId) -> Result<Option<Message>> {
        read_message(&self.conn, peer, id)
    }

    /// Count the messages cached for a peer.
    pub fn count_messages(&self, peer: PeerId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE peer = ?1",
            params![peer.to_string()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Get a settings document.
    pub fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(Error::from))
            .transpose()
    }
}

fn read_message(conn: &Connection, peer: PeerId, id: MessageId) -> Result<Option<Message>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE peer = ?1 AND id = ?2");
    let message = conn
        .query_row(&sql, params![peer.to_string(), id.get()], message_from_row)
        .optional()?;
    Ok(message)
}

/// A write transaction on the local cache.
pub struct SqliteTxn<'a> {
    tx: Transaction<'a>,
}

impl StoreTxn for SqliteTxn<'_> {
    fn insert_message(&mut self, message: &Message) -> Result<bool> {
        let inserted = self.tx.execute(
            "INSERT OR IGNORE INTO messages (peer, id, from_id, date, text, out)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.peer.to_string(),
                message.id.get(),
                message.from_id,
                message.date.to_rfc3339(),
                message.text,
                message.out,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn update_message_text(
        &mut self,
        peer: PeerId,
        id: MessageId,
        text: Option<&str>,
    ) -> Result<bool> {
        let affected = self.tx.execute(
            "UPDATE messages SET text = ?1 WHERE peer = ?2 AND id = ?3",
            params![text, peer.to_string(), id.get()],
        )?;
        Ok(affected > 0)
    }

    fn delete_message(&mut self, peer: PeerId, id: MessageId) -> Result<Option<Message>> {
        let existing = read_message(&self.tx, peer, id)?;
        if existing.is_some() {
            self.tx.execute(
                "DELETE FROM messages WHERE peer = ?1 AND id = ?2",
                params![peer.to_string(), id.get()],
            )?;
        }
        Ok(existing)
    }

    fn dialog(&self, peer: PeerId) -> Result<Option<Dialog>> {
        let sql = format!("SELECT {DIALOG_COLUMNS} FROM dialogs WHERE peer = ?1");
        let dialog = self
            .tx
            .query_row(&sql, params![peer.to_string()], dialog_from_row)
            .optional()?;
        Ok(dialog)
    }

    fn put_dialog(&mut self, dialog: &Dialog) -> Result<()> {
        self.tx.execute(
            "INSERT INTO dialogs (peer, unread_count, read_inbox_max_id, unread_mark, pinned, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(peer) DO UPDATE SET
                 unread_count = excluded.unread_count,
                 read_inbox_max_id = excluded.read_inbox_max_id,
                 unread_mark = excluded.unread_mark,
                 pinned = excluded.pinned,
                 archived = excluded.archived",
            params![
                dialog.peer.to_string(),
                dialog.unread_count,
                dialog.read_inbox_max_id.map(|id| id.get()),
                dialog.unread_mark,
                dialog.pinned,
                dialog.archived,
            ],
        )?;
        Ok(())
    }

    fn put_setting(&mut self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.tx.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    fn put_cursor(
        &mut self,
        bucket: &BucketKey,
        sequence: i64,
        date: DateTime<Utc>,
    ) -> Result<()> {
        self.tx.execute(
            "INSERT INTO bucket_cursors (bucket, sequence, date) VALUES (?1, ?2, ?3)
             ON CONFLICT(bucket) DO UPDATE SET
                 sequence = excluded.sequence,
                 date = excluded.date
             WHERE excluded.sequence > bucket_cursors.sequence",
            params![bucket.to_string(), sequence, date.to_rfc3339()],
        )?;
        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

impl Store for Database {
    type Txn<'a> = SqliteTxn<'a>;

    fn begin(&mut self) -> Result<SqliteTxn<'_>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTxn { tx })
    }

    fn load_cursors(&self) -> Result<Vec<StoredCursor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT bucket, sequence, date FROM bucket_cursors ORDER BY bucket")?;
        let cursors = stmt
            .query_map([], |row| {
                let bucket: String = row.get(0)?;
                let date: String = row.get(2)?;
                Ok(StoredCursor {
                    bucket: parse_db(&bucket, "bucket")?,
                    sequence: row.get(1)?,
                    date: parse_timestamp(&date, "date")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cursors)
    }

    fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM messages;
             DELETE FROM dialogs;
             DELETE FROM settings;
             DELETE FROM bucket_cursors;",
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
