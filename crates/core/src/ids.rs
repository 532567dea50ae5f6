// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized peer and message identifiers.
//!
//! Message ids reach the client as integers, numeric strings, or boxed
//! numbers depending on the producer. They are normalized to a single
//! positive integer type at the boundary; anything that does not parse
//! cleanly is treated as "no id" rather than carried inward.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A conversation partner: a direct-message user or a chat thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerId {
    /// Direct messages with a user.
    User(i64),
    /// A group chat or thread.
    Thread(i64),
}

impl PeerId {
    /// Returns the numeric id without the peer kind.
    pub fn raw(&self) -> i64 {
        match self {
            PeerId::User(id) | PeerId::Thread(id) => *id,
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerId::User(id) => write!(f, "user:{id}"),
            PeerId::Thread(id) => write!(f, "thread:{id}"),
        }
    }
}

impl FromStr for PeerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidPeer(s.to_string()))?;
        let id: i64 = id.parse().map_err(|_| Error::InvalidPeer(s.to_string()))?;
        match kind {
            "user" => Ok(PeerId::User(id)),
            "thread" => Ok(PeerId::Thread(id)),
            _ => Err(Error::InvalidPeer(s.to_string())),
        }
    }
}

/// Server-assigned message id, unique within a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Normalizes a loosely-typed JSON id.
    ///
    /// Accepts positive integers and strings holding a positive integer.
    /// Everything else (floats, negatives, garbage, null) yields `None`.
    pub fn parse_loose(value: &serde_json::Value) -> Option<MessageId> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().filter(|id| *id > 0).map(MessageId),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the raw integer value.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<i64>() {
            Ok(id) if id > 0 => Ok(MessageId(id)),
            _ => Err(Error::InvalidMessageId(s.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
