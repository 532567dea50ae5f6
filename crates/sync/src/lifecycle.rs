// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Session state shared between the runner and status readers.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use serde::Serialize;

/// Where the session is in its connection cycle.
///
/// `Disconnected -> Connecting -> Authenticating -> Syncing -> Live`, and
/// back to `Disconnected` when the connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Authenticating = 2,
    /// Catching up buckets that fell behind while offline.
    Syncing = 3,
    /// Every bucket caught up; live updates are direct-applied.
    Live = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Authenticating,
            3 => SessionState::Syncing,
            4 => SessionState::Live,
            _ => SessionState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Syncing => "syncing",
            SessionState::Live => "live",
        }
    }

    /// True once the handshake has completed.
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Syncing | SessionState::Live)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state visible to every task.
///
/// Uses atomic fields for lock-free reads from status queries.
#[derive(Debug)]
pub struct SharedSessionState {
    state: AtomicU8,
    attempt: AtomicU32,
}

impl SharedSessionState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Disconnected as u8),
            attempt: AtomicU32::new(0),
        }
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Stores `state`, returning the previous one.
    pub fn set(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.state.swap(state as u8, Ordering::AcqRel))
    }

    /// Current reconnect attempt, 0 when not retrying.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Release);
    }

    /// Human-readable status for operator output.
    pub fn status_string(&self) -> String {
        match self.get() {
            SessionState::Connecting => match self.attempt() {
                0 => "connecting".to_string(),
                attempt => format!("connecting (attempt {attempt})"),
            },
            state => state.to_string(),
        }
    }
}

impl Default for SharedSessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
