// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use chrono::{TimeZone, Utc};
use inl_core::{Apply, BucketKey, Database, Message, MessageId, PeerId, Update, UpdateEnvelope};

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// Command isolated from the user's config and token.
pub fn sync_cmd(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("inline-sync");
    cmd.env_remove("INLINE_TOKEN")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(temp.path().join("config.toml"))
        .arg("--db")
        .arg(db_path(temp));
    cmd
}

pub fn db_path(temp: &TempDir) -> PathBuf {
    temp.path().join("cache.db")
}

/// Creates a cache with one chat bucket at sequence 2 holding one unread
/// message.
pub fn seed_cache(temp: &TempDir) {
    let mut db = Database::open(&db_path(temp)).unwrap();
    let peer = PeerId::User(5);
    let bucket = BucketKey::Chat(peer);
    let date = Utc.timestamp_opt(1_760_000_000, 0).unwrap();

    db.record_cursor(&BucketKey::User, 7, date).unwrap();
    let envelope = UpdateEnvelope::new(
        bucket,
        2,
        date,
        Update::NewMessage {
            message: Message {
                id: MessageId(21),
                peer,
                from_id: 5,
                date,
                text: Some("hello".into()),
                out: false,
            },
        },
    );
    assert!(db.apply_update(&envelope).is_applied());
}
