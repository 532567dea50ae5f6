// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by the command-line tool.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("{0}\n  hint: set `url` in the config file or pass --url")]
    InvalidUrl(String),

    #[error("cache database not found: {0}\n  hint: run `inline-sync run` first")]
    NoCache(PathBuf),

    #[error(transparent)]
    Store(#[from] inl_core::Error),

    #[error(transparent)]
    Sync(#[from] inl_sync::SyncError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
