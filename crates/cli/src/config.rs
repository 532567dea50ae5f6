// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tool configuration.
//!
//! Stored as TOML, by default in `<data dir>/inline-sync/config.toml`:
//!
//! ```toml
//! db_path = "/var/cache/inline/cache.db"
//!
//! [sync]
//! url = "wss://api.example.com/realtime"
//! max_batch_size = 200
//! ```
//!
//! A missing file means defaults everywhere.

use std::fs;
use std::path::{Path, PathBuf};

use inl_sync::SyncConfig;
use serde::Deserialize;

use crate::error::{Error, Result};

const APP_DIR_NAME: &str = "inline-sync";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "cache.db";

/// Contents of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Cache database location. Defaults to the data directory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Directory holding the default config and cache.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE_NAME)
}

impl Config {
    /// Parses a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` (or the default location), treating a missing file as
    /// an empty one.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(default_config_path, Path::to_path_buf);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        Self::load(&path)
    }

    /// Cache database path.
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| data_dir().join(DB_FILE_NAME))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
