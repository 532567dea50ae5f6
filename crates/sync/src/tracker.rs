// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-bucket sequence state.
//!
//! Every bucket has its own slot behind its own lock; that lock is the
//! single-writer serialization point for all decisions about the bucket.
//! There is no lock spanning buckets other than the short-lived map lock
//! used to look slots up.
//!
//! Lock order: map, then slot, then store. The map lock is never taken
//! while a slot lock is held.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use inl_core::{BucketKey, UpdateEnvelope};

use crate::stats::{BucketSnapshot, StatsRecorder};

/// Locks a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What to do with an incoming update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Next in sequence; apply it now.
    Apply,
    /// At or below the stored sequence; already applied.
    Duplicate,
    /// Ahead of the next expected sequence; catch up first.
    Gap { expected: i64, received: i64 },
    /// No baseline for this bucket yet; catch up first.
    Unknown,
}

/// Sequence position of one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketState {
    /// Last applied sequence, `None` before a baseline is known.
    pub sequence: Option<i64>,
    /// Server time of the last applied update. Informational only.
    pub date: Option<DateTime<Utc>>,
    pub is_fetching: bool,
    pub needs_fetch: bool,
}

impl BucketState {
    /// Starts from a known position.
    pub fn at(sequence: i64, date: DateTime<Utc>) -> Self {
        BucketState {
            sequence: Some(sequence),
            date: Some(date),
            is_fetching: false,
            needs_fetch: false,
        }
    }

    /// Classifies an incoming sequence. Never mutates.
    pub fn observe(&self, incoming: i64) -> Decision {
        match self.sequence {
            None => Decision::Unknown,
            Some(current) if incoming <= current => Decision::Duplicate,
            Some(current) if incoming == current + 1 => Decision::Apply,
            Some(current) => Decision::Gap {
                expected: current + 1,
                received: incoming,
            },
        }
    }

    /// Moves the position forward. Ignores anything at or below the current
    /// sequence.
    pub fn advance(&mut self, sequence: i64, date: DateTime<Utc>) -> bool {
        if self.sequence.is_some_and(|current| sequence <= current) {
            return false;
        }
        self.sequence = Some(sequence);
        self.date = Some(date);
        true
    }
}

/// Everything the engine keeps for one bucket.
#[derive(Debug, Default)]
pub struct BucketSlot {
    pub state: BucketState,
    /// Out-of-order updates held until the gap before them is filled.
    deferred: BTreeMap<i64, UpdateEnvelope>,
    /// Bumped whenever a fetch starts or is cancelled. A fetch only writes
    /// back if the epoch it started with is still current.
    epoch: u64,
}

impl BucketSlot {
    /// Holds an out-of-order update. Returns false when the buffer is full
    /// and the update was dropped.
    pub fn defer(&mut self, envelope: UpdateEnvelope, capacity: usize) -> bool {
        if self.deferred.contains_key(&envelope.sequence) {
            return true;
        }
        if self.deferred.len() >= capacity {
            return false;
        }
        self.deferred.insert(envelope.sequence, envelope);
        true
    }

    /// Removes the lowest deferred update.
    pub fn pop_deferred(&mut self) -> Option<UpdateEnvelope> {
        self.deferred.pop_first().map(|(_, envelope)| envelope)
    }

    /// Puts back an update taken with [`pop_deferred`](Self::pop_deferred).
    pub fn restore_deferred(&mut self, envelope: UpdateEnvelope) {
        self.deferred.insert(envelope.sequence, envelope);
    }

    /// Sequence of the lowest deferred update.
    pub fn lowest_deferred(&self) -> Option<i64> {
        self.deferred.keys().next().copied()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Claims the fetch for this bucket.
    ///
    /// Returns the new epoch, or `None` if a fetch is already in flight.
    pub fn begin_fetch(&mut self) -> Option<u64> {
        if self.state.is_fetching {
            return None;
        }
        self.state.is_fetching = true;
        self.state.needs_fetch = true;
        self.epoch += 1;
        Some(self.epoch)
    }

    /// True while the fetch that started with `epoch` still owns the slot.
    pub fn owns(&self, epoch: u64) -> bool {
        self.state.is_fetching && self.epoch == epoch
    }

    /// Releases the fetch claim, leaving `needs_fetch` untouched.
    pub fn end_fetch(&mut self, epoch: u64) {
        if self.owns(epoch) {
            self.state.is_fetching = false;
        }
    }

    /// Abandons any in-flight fetch. The bucket stays flagged if it was
    /// fetching, so the next connection resumes it.
    pub fn cancel_fetch(&mut self) {
        if self.state.is_fetching {
            self.state.is_fetching = false;
            self.state.needs_fetch = true;
        }
        self.epoch += 1;
    }

    fn snapshot(&self, bucket: BucketKey) -> BucketSnapshot {
        BucketSnapshot {
            bucket,
            sequence: self.state.sequence,
            date: self.state.date,
            is_fetching: self.state.is_fetching,
            needs_fetch: self.state.needs_fetch,
            deferred: self.deferred.len(),
        }
    }
}

/// Owner of all bucket state and the sync counters.
#[derive(Debug)]
pub struct Tracker {
    buckets: Mutex<BTreeMap<BucketKey, Arc<Mutex<BucketSlot>>>>,
    stats: StatsRecorder,
    max_deferred: usize,
}

impl Tracker {
    pub fn new(max_deferred: usize) -> Self {
        Tracker {
            buckets: Mutex::new(BTreeMap::new()),
            stats: StatsRecorder::new(),
            max_deferred,
        }
    }

    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }

    /// Per-bucket capacity of the deferred buffer.
    pub fn max_deferred(&self) -> usize {
        self.max_deferred
    }

    /// Returns the slot for `bucket`, creating an empty one if needed.
    pub fn slot(&self, bucket: BucketKey) -> Arc<Mutex<BucketSlot>> {
        Arc::clone(lock(&self.buckets).entry(bucket).or_default())
    }

    /// Returns the slot for `bucket` if it is tracked.
    pub fn get(&self, bucket: &BucketKey) -> Option<Arc<Mutex<BucketSlot>>> {
        lock(&self.buckets).get(bucket).map(Arc::clone)
    }

    /// Starts tracking `bucket` at a persisted position.
    pub fn seed(&self, bucket: BucketKey, sequence: i64, date: DateTime<Utc>) {
        let slot = self.slot(bucket);
        lock(&slot).state.advance(sequence, date);
    }

    /// All tracked slots in bucket order.
    pub fn slots(&self) -> Vec<(BucketKey, Arc<Mutex<BucketSlot>>)> {
        lock(&self.buckets)
            .iter()
            .map(|(bucket, slot)| (*bucket, Arc::clone(slot)))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.buckets).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of a bucket's state.
    pub fn state(&self, bucket: &BucketKey) -> Option<BucketState> {
        self.get(bucket).map(|slot| lock(&slot).state.clone())
    }

    /// Per-bucket diagnostics listing.
    pub fn snapshot(&self) -> Vec<BucketSnapshot> {
        self.slots()
            .into_iter()
            .map(|(bucket, slot)| lock(&slot).snapshot(bucket))
            .collect()
    }

    /// Forgets every bucket, cancelling their fetches first.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *lock(&self.buckets));
        for slot in drained.values() {
            lock(slot).cancel_fetch();
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
