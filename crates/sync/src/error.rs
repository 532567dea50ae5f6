// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the sync engine and runner.

use inl_core::protocol::rpc_error_label;

use crate::transport::TransportError;

fn label(code: &i32) -> &'static str {
    rpc_error_label(*code)
}

/// Why a catch-up fetch did not produce updates.
///
/// Every variant is recoverable: the bucket keeps `needs_fetch` set and the
/// next trigger retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The transport failed while sending or receiving.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with an error.
    #[error("{}: {message} (code {code})", label(.code))]
    Server { code: i32, message: String },

    /// No answer within the fetch timeout.
    #[error("fetch timed out")]
    Timeout,

    /// The connection dropped while the fetch was in flight.
    #[error("fetch cancelled")]
    Cancelled,

    /// There is no live connection to fetch through.
    #[error("not connected")]
    Disconnected,

    /// The server kept reporting too-long ranges at the smallest batch size.
    #[error("range still too long at batch size {0}")]
    Unbounded(u32),

    /// A non-final slice did not move past the requested sequence.
    #[error("no progress past sequence {0}")]
    Stalled(i64),

    /// A fetched update could not be written locally.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Error type for sync runner operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] inl_core::Error),

    /// Not connected.
    #[error("not connected to realtime server")]
    NotConnected,

    /// Max retries exceeded.
    #[error("max reconnection retries exceeded")]
    MaxRetriesExceeded,

    /// The server rejected the session token.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server did not complete the handshake in time.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

/// Result type for sync runner operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
