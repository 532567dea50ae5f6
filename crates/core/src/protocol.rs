// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime protocol messages for client-server communication.
//!
//! The protocol is simple:
//! - Client opens with a token, then requests catch-up ranges and bucket heads
//! - Server pushes live updates and answers requests by `request_id`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::{BucketHead, BucketKey};
use crate::update::UpdateEnvelope;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a connection. Answered by `ConnectionOpen` or
    /// `ConnectionError`.
    ConnectionInit {
        token: String,
        client_version: String,
    },

    /// Request the updates of a bucket after a sequence.
    GetUpdates {
        request_id: u64,
        bucket: BucketKey,
        /// Return updates with sequence > this value.
        from_sequence_exclusive: i64,
        max_batch_size: u32,
    },

    /// Request the current head of a bucket.
    GetBucketHead { request_id: u64, bucket: BucketKey },
}

/// How the server answered a `GetUpdates` request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdatesResultKind {
    /// Nothing after the requested sequence.
    Empty,
    /// A contiguous slice of updates.
    Slice,
    /// The range exceeds the server batch limit; ask for a narrower one.
    TooLong,
}

/// Answer to a `GetUpdates` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatesResult {
    pub kind: UpdatesResultKind,
    /// Updates in the slice, in any order.
    #[serde(default)]
    pub updates: Vec<UpdateEnvelope>,
    /// Bucket position covered by this answer.
    pub sequence: i64,
    pub date: Option<DateTime<Utc>>,
    /// False when more updates remain after `sequence`.
    #[serde(default = "default_final")]
    pub is_final: bool,
}

fn default_final() -> bool {
    true
}

impl UpdatesResult {
    /// Creates a slice answer.
    pub fn slice(
        updates: Vec<UpdateEnvelope>,
        sequence: i64,
        date: DateTime<Utc>,
        is_final: bool,
    ) -> Self {
        UpdatesResult {
            kind: UpdatesResultKind::Slice,
            updates,
            sequence,
            date: Some(date),
            is_final,
        }
    }

    /// Creates an empty answer.
    pub fn empty(sequence: i64) -> Self {
        UpdatesResult {
            kind: UpdatesResultKind::Empty,
            updates: Vec::new(),
            sequence,
            date: None,
            is_final: true,
        }
    }

    /// Creates a too-long answer.
    pub fn too_long(sequence: i64) -> Self {
        UpdatesResult {
            kind: UpdatesResultKind::TooLong,
            updates: Vec::new(),
            sequence,
            date: None,
            is_final: false,
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted. Carries the current head of every bucket the
    /// account participates in.
    ConnectionOpen { buckets: Vec<BucketHead> },

    /// Handshake rejected or connection torn down by the server.
    ConnectionError { message: String },

    /// A live update.
    Update(UpdateEnvelope),

    /// Response to `GetUpdates`.
    UpdatesResult {
        request_id: u64,
        result: UpdatesResult,
    },

    /// Response to `GetBucketHead`.
    BucketHead { request_id: u64, head: BucketHead },

    /// A request failed on the server.
    RpcError {
        request_id: u64,
        code: i32,
        message: String,
    },
}

impl ClientMessage {
    /// Creates a ConnectionInit message.
    pub fn connection_init(token: impl Into<String>, client_version: impl Into<String>) -> Self {
        ClientMessage::ConnectionInit {
            token: token.into(),
            client_version: client_version.into(),
        }
    }

    /// Returns the request id for request/response messages.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ClientMessage::GetUpdates { request_id, .. }
            | ClientMessage::GetBucketHead { request_id, .. } => Some(*request_id),
            ClientMessage::ConnectionInit { .. } => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates an Update message.
    pub fn update(envelope: UpdateEnvelope) -> Self {
        ServerMessage::Update(envelope)
    }

    /// Returns the request id this message answers, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ServerMessage::UpdatesResult { request_id, .. }
            | ServerMessage::BucketHead { request_id, .. }
            | ServerMessage::RpcError { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Human-readable label for a server RPC error code.
pub fn rpc_error_label(code: i32) -> &'static str {
    match code {
        1 => "Bad request",
        2 => "Not authenticated",
        3 => "Rate limited",
        4 => "Internal server error",
        5 => "Invalid peer (chat/user id)",
        6 => "Invalid message id",
        7 => "Invalid user id",
        8 => "User already in chat/space",
        9 => "Invalid space id",
        10 => "Invalid chat id",
        11 => "Invalid email address",
        12 => "Invalid phone number",
        13 => "Space admin required",
        14 => "Space owner required",
        _ => "Unknown RPC error",
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
