// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Update buckets: independent partitions of the update sequence space.
//!
//! Text form (used on the wire and in the store):
//! - `user` for account-wide updates
//! - `space:<id>` for workspace-scoped updates
//! - `chat:<peer>` for a single conversation, e.g. `chat:user:5`
//!
//! Sequence numbers are only comparable within the same bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ids::PeerId;

/// Identifies one partition of the update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BucketKey {
    /// Account-wide updates: settings, dialog list changes.
    User,
    /// Updates scoped to a space.
    Space(i64),
    /// Updates scoped to a single chat.
    Chat(PeerId),
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::User => f.write_str("user"),
            BucketKey::Space(id) => write!(f, "space:{id}"),
            BucketKey::Chat(peer) => write!(f, "chat:{peer}"),
        }
    }
}

impl FromStr for BucketKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "user" {
            return Ok(BucketKey::User);
        }
        if let Some(id) = s.strip_prefix("space:") {
            return id
                .parse()
                .map(BucketKey::Space)
                .map_err(|_| Error::InvalidBucketKey(s.to_string()));
        }
        if let Some(peer) = s.strip_prefix("chat:") {
            return peer
                .parse()
                .map(BucketKey::Chat)
                .map_err(|_| Error::InvalidBucketKey(s.to_string()));
        }
        Err(Error::InvalidBucketKey(s.to_string()))
    }
}

impl From<BucketKey> for String {
    fn from(key: BucketKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for BucketKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// The server's current position in a bucket.
///
/// Advertised in the connection handshake and returned for bucket head
/// queries. A bucket with no local history starts from its head rather
/// than from sequence zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketHead {
    pub bucket: BucketKey,
    pub sequence: i64,
    pub date: DateTime<Utc>,
}

impl BucketHead {
    pub fn new(bucket: BucketKey, sequence: i64, date: DateTime<Utc>) -> Self {
        BucketHead {
            bucket,
            sequence,
            date,
        }
    }
}

#[cfg(test)]
#[path = "bucket_tests.rs"]
mod tests;
