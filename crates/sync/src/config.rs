// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync engine configuration.
//!
//! Every field has a default, so a partial (or empty) TOML table is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the sync engine and its connection runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Realtime endpoint (`ws://...` or `wss://...`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Batch size for the first catch-up request of a bucket.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,
    /// Batch size for continuation requests after a too-long answer.
    #[serde(default = "default_followup_batch_size")]
    pub followup_batch_size: u32,
    /// Max time to wait for a single fetch answer in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Max updates held per bucket while it is behind.
    #[serde(default = "default_max_deferred_updates")]
    pub max_deferred_updates: usize,
    /// Max time to wait for the connection handshake in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    #[serde(default = "default_reconnect_max_retries")]
    pub reconnect_max_retries: u32,
    /// Maximum delay between reconnection attempts in seconds.
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub reconnect_max_delay_secs: u64,
    /// Initial delay for exponential backoff in milliseconds.
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    /// Interval for logging a stats snapshot in seconds (0 = disabled).
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_url() -> String {
    "ws://localhost:8000/realtime".to_string()
}

fn default_max_batch_size() -> u32 {
    100
}

fn default_followup_batch_size() -> u32 {
    50
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_max_deferred_updates() -> usize {
    1000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_max_retries() -> u32 {
    10
}

fn default_reconnect_max_delay_secs() -> u64 {
    30
}

fn default_reconnect_initial_delay_ms() -> u64 {
    100
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            url: default_url(),
            max_batch_size: default_max_batch_size(),
            followup_batch_size: default_followup_batch_size(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_deferred_updates: default_max_deferred_updates(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            reconnect_max_retries: default_reconnect_max_retries(),
            reconnect_max_delay_secs: default_reconnect_max_delay_secs(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl SyncConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Batch size used once a range has been reported too long.
    ///
    /// Always at least one and never larger than the initial batch.
    pub fn narrowed_batch_size(&self) -> u32 {
        self.followup_batch_size.min(self.max_batch_size).max(1)
    }

    /// Validates that the URL is a WebSocket endpoint.
    ///
    /// Returns an error message if the URL is invalid.
    pub fn validate_url(&self) -> Option<String> {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            None
        } else {
            Some(format!(
                "invalid sync URL '{}': must start with ws:// or wss://",
                self.url
            ))
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
