// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for inl-core operations.

use thiserror::Error;

/// All possible errors that can occur in inl-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid bucket key: '{0}'\n  hint: valid forms are: user, space:<id>, chat:user:<id>, chat:thread:<id>")]
    InvalidBucketKey(String),

    #[error("invalid peer: '{0}'\n  hint: valid forms are: user:<id>, thread:<id>")]
    InvalidPeer(String),

    #[error("invalid message id: '{0}'")]
    InvalidMessageId(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for inl-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
