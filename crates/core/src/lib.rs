// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! inl-core: Shared library for the inline sync engine
//!
//! This crate provides the update model (buckets, envelopes, payloads), the
//! realtime protocol messages, the local store interface with its SQLite
//! implementation, and the transactional update applier.

pub mod apply;
pub mod bucket;
pub mod db;
pub mod error;
pub mod ids;
pub mod protocol;
pub mod store;
pub mod update;

pub use apply::{Apply, ApplyOutcome, SkipReason};
pub use bucket::{BucketHead, BucketKey};
pub use db::Database;
pub use error::{Error, Result};
pub use ids::{MessageId, PeerId};
pub use store::{Dialog, Store, StoreTxn, StoredCursor};
pub use update::{Message, Update, UpdateEnvelope};
