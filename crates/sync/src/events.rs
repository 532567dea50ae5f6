// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed sync events for UI and diagnostics subscribers.
//!
//! Published on a broadcast channel. Slow subscribers lag and miss events;
//! the engine never blocks on them.

use inl_core::BucketKey;

use crate::lifecycle::SessionState;

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Something the engine did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// An update was applied to the local store.
    Applied {
        bucket: BucketKey,
        sequence: i64,
        /// True for the in-order fast path, false for catch-up and drained updates.
        direct: bool,
    },
    /// An update at or below the stored sequence was discarded.
    Duplicate { bucket: BucketKey, sequence: i64 },
    /// A non-contiguous update arrived. `expected` is `None` for a bucket
    /// with no baseline.
    GapDetected {
        bucket: BucketKey,
        expected: Option<i64>,
        received: i64,
    },
    /// A catch-up fetch started.
    FetchStarted { bucket: BucketKey, from: Option<i64> },
    /// A catch-up drained the bucket up to `sequence`.
    FetchCompleted {
        bucket: BucketKey,
        applied: u64,
        sequence: i64,
    },
    /// A catch-up failed; the bucket stays behind.
    FetchFailed { bucket: BucketKey, reason: String },
    /// A local transaction failed; the bucket sequence was not advanced.
    StorageFailed { bucket: BucketKey, sequence: i64 },
    /// The session moved to a new state.
    SessionChanged(SessionState),
    /// All bucket state was discarded (logout).
    Reset,
}
