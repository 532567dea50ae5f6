// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync counters and the read-only diagnostics snapshot.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use inl_core::BucketKey;
use serde::Serialize;

/// Point-in-time copy of the sync counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub buckets_tracked: usize,
    pub direct_updates_applied: u64,
    pub bucket_updates_applied: u64,
    pub bucket_updates_skipped: u64,
    pub bucket_updates_duplicate_skipped: u64,
    pub bucket_fetch_count: u64,
    pub bucket_fetch_failures: u64,
    pub bucket_fetch_too_long: u64,
    pub bucket_fetch_followups: u64,
    pub storage_failures: u64,
    pub deferred_dropped: u64,
    pub last_direct_apply_at: Option<DateTime<Utc>>,
    pub last_bucket_apply_at: Option<DateTime<Utc>>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_fetch_failure_at: Option<DateTime<Utc>>,
}

/// Per-bucket row of the diagnostics listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSnapshot {
    pub bucket: BucketKey,
    pub sequence: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    pub is_fetching: bool,
    pub needs_fetch: bool,
    pub deferred: usize,
}

/// Counters plus the per-bucket listing, sorted by bucket key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub stats: SyncStats,
    pub buckets: Vec<BucketSnapshot>,
}

/// Timestamp slot storing epoch milliseconds, 0 meaning "never".
#[derive(Debug, Default)]
struct Stamp(AtomicI64);

impl Stamp {
    fn touch(&self) {
        self.0.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn get(&self) -> Option<DateTime<Utc>> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Lock-free counters shared by the tracker and the fetch path.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    direct_updates_applied: AtomicU64,
    bucket_updates_applied: AtomicU64,
    bucket_updates_skipped: AtomicU64,
    bucket_updates_duplicate_skipped: AtomicU64,
    bucket_fetch_count: AtomicU64,
    bucket_fetch_failures: AtomicU64,
    bucket_fetch_too_long: AtomicU64,
    bucket_fetch_followups: AtomicU64,
    storage_failures: AtomicU64,
    deferred_dropped: AtomicU64,
    last_direct_apply_at: Stamp,
    last_bucket_apply_at: Stamp,
    last_fetch_at: Stamp,
    last_fetch_failure_at: Stamp,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direct_applied(&self) {
        bump(&self.direct_updates_applied);
        self.last_direct_apply_at.touch();
    }

    pub fn bucket_applied(&self) {
        bump(&self.bucket_updates_applied);
        self.last_bucket_apply_at.touch();
    }

    pub fn skipped(&self) {
        bump(&self.bucket_updates_skipped);
    }

    pub fn duplicate_skipped(&self) {
        bump(&self.bucket_updates_duplicate_skipped);
    }

    pub fn fetch_completed(&self) {
        bump(&self.bucket_fetch_count);
        self.last_fetch_at.touch();
    }

    pub fn fetch_failed(&self) {
        bump(&self.bucket_fetch_failures);
        self.last_fetch_failure_at.touch();
    }

    pub fn too_long(&self) {
        bump(&self.bucket_fetch_too_long);
    }

    pub fn followup(&self) {
        bump(&self.bucket_fetch_followups);
    }

    pub fn storage_failed(&self) {
        bump(&self.storage_failures);
    }

    pub fn deferred_dropped(&self) {
        bump(&self.deferred_dropped);
    }

    /// Copies the counters. `buckets_tracked` is filled in by the caller.
    pub fn snapshot(&self, buckets_tracked: usize) -> SyncStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        SyncStats {
            buckets_tracked,
            direct_updates_applied: load(&self.direct_updates_applied),
            bucket_updates_applied: load(&self.bucket_updates_applied),
            bucket_updates_skipped: load(&self.bucket_updates_skipped),
            bucket_updates_duplicate_skipped: load(&self.bucket_updates_duplicate_skipped),
            bucket_fetch_count: load(&self.bucket_fetch_count),
            bucket_fetch_failures: load(&self.bucket_fetch_failures),
            bucket_fetch_too_long: load(&self.bucket_fetch_too_long),
            bucket_fetch_followups: load(&self.bucket_fetch_followups),
            storage_failures: load(&self.storage_failures),
            deferred_dropped: load(&self.deferred_dropped),
            last_direct_apply_at: self.last_direct_apply_at.get(),
            last_bucket_apply_at: self.last_bucket_apply_at.get(),
            last_fetch_at: self.last_fetch_at.get(),
            last_fetch_failure_at: self.last_fetch_failure_at.get(),
        }
    }

    /// Zeroes every counter and timestamp.
    pub fn reset(&self) {
        for counter in [
            &self.direct_updates_applied,
            &self.bucket_updates_applied,
            &self.bucket_updates_skipped,
            &self.bucket_updates_duplicate_skipped,
            &self.bucket_fetch_count,
            &self.bucket_fetch_failures,
            &self.bucket_fetch_too_long,
            &self.bucket_fetch_followups,
            &self.storage_failures,
            &self.deferred_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        for stamp in [
            &self.last_direct_apply_at,
            &self.last_bucket_apply_at,
            &self.last_fetch_at,
            &self.last_fetch_failure_at,
        ] {
            stamp.clear();
        }
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
