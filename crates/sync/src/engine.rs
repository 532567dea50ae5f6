// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync engine: direct-apply fast path, catch-up and lifecycle hooks.
//!
//! A [`SyncEngine`] is an explicitly constructed handle. Clones share the
//! same buckets, store, fetcher and counters.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::future::join_all;
use inl_core::{Apply, ApplyOutcome, BucketHead, BucketKey, SkipReason, Store, UpdateEnvelope};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::FetchError;
use crate::events::{SyncEvent, EVENT_CHANNEL_CAPACITY};
use crate::fetcher::{FetchOutcome, FetchRequest, FetchedRange, Fetcher};
use crate::lifecycle::{SessionState, SharedSessionState};
use crate::stats::{SyncSnapshot, SyncStats};
use crate::tracker::{lock, BucketSlot, BucketState, Decision, Tracker};

/// How a live update was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Applied on the fast path.
    Applied,
    /// Contiguous, but the local write failed. The bucket is flagged.
    StorageFailed,
    Duplicate,
    /// Held back until the bucket catches up.
    Deferred {
        /// True if no fetch was running and the caller should start one.
        start_fetch: bool,
    },
}

/// How a catch-up ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchUp {
    /// Another fetch already owns the bucket.
    AlreadyInFlight,
    /// The bucket was drained up to `sequence`.
    Drained { applied: u64, sequence: Option<i64> },
    /// The bucket is still behind.
    Failed(FetchError),
}

struct Inner<S, F> {
    config: SyncConfig,
    store: Mutex<S>,
    fetcher: F,
    tracker: Tracker,
    events: broadcast::Sender<SyncEvent>,
    cancel: Mutex<CancellationToken>,
    session: Arc<SharedSessionState>,
}

/// Handle to the engine.
pub struct SyncEngine<S, F> {
    inner: Arc<Inner<S, F>>,
}

impl<S, F> Clone for SyncEngine<S, F> {
    fn clone(&self) -> Self {
        SyncEngine {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, F> SyncEngine<S, F>
where
    S: Store + 'static,
    F: Fetcher + 'static,
{
    /// Creates an engine, resuming every bucket from its persisted cursor.
    pub fn new(config: SyncConfig, store: S, fetcher: F) -> inl_core::Result<Self> {
        let tracker = Tracker::new(config.max_deferred_updates);
        for cursor in store.load_cursors()? {
            tracker.seed(cursor.bucket, cursor.sequence, cursor.date);
        }
        tracing::debug!(buckets = tracker.len(), "loaded bucket cursors");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(SyncEngine {
            inner: Arc::new(Inner {
                config,
                store: Mutex::new(store),
                fetcher,
                tracker,
                events,
                cancel: Mutex::new(CancellationToken::new()),
                session: Arc::new(SharedSessionState::new()),
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn session(&self) -> Arc<SharedSessionState> {
        Arc::clone(&self.inner.session)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Runs `f` with exclusive access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut lock(&self.inner.store))
    }

    /// Copy of one bucket's state.
    pub fn bucket_state(&self, bucket: &BucketKey) -> Option<BucketState> {
        self.inner.tracker.state(bucket)
    }

    /// Counters and per-bucket listing. No side effects.
    pub fn snapshot(&self) -> SyncSnapshot {
        let buckets = self.inner.tracker.snapshot();
        SyncSnapshot {
            stats: self.inner.tracker.stats().snapshot(buckets.len()),
            buckets,
        }
    }

    pub fn get_sync_stats(&self) -> SyncStats {
        self.inner
            .tracker
            .stats()
            .snapshot(self.inner.tracker.len())
    }

    fn emit(&self, event: SyncEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn set_session(&self, state: SessionState) {
        if self.inner.session.set(state) != state {
            tracing::info!(state = %state, "session state changed");
            self.emit(SyncEvent::SessionChanged(state));
        }
    }

    fn cancel_token(&self) -> CancellationToken {
        lock(&self.inner.cancel).clone()
    }

    fn rotate_cancel_token(&self) {
        let old = std::mem::take(&mut *lock(&self.inner.cancel));
        old.cancel();
    }

    // -- fast path --

    /// Routes a live update through the tracker without fetching.
    pub fn ingest(&self, envelope: UpdateEnvelope) -> Ingested {
        let bucket = envelope.bucket;
        let slot = self.inner.tracker.slot(bucket);
        let mut slot = lock(&slot);
        let stats = self.inner.tracker.stats();

        match slot.state.observe(envelope.sequence) {
            Decision::Apply => {
                if !self.apply_one(&mut slot, &envelope, true) {
                    return Ingested::StorageFailed;
                }
                self.drain_deferred(&mut slot);
                Ingested::Applied
            }
            Decision::Duplicate => {
                tracing::debug!(bucket = %bucket, sequence = envelope.sequence, "duplicate update");
                stats.duplicate_skipped();
                self.emit(SyncEvent::Duplicate {
                    bucket,
                    sequence: envelope.sequence,
                });
                Ingested::Duplicate
            }
            decision => {
                let expected = match decision {
                    Decision::Gap { expected, .. } => Some(expected),
                    _ => None,
                };
                tracing::debug!(
                    bucket = %bucket,
                    expected = ?expected,
                    received = envelope.sequence,
                    fetching = slot.state.is_fetching,
                    "gap detected"
                );
                stats.skipped();
                self.emit(SyncEvent::GapDetected {
                    bucket,
                    expected,
                    received: envelope.sequence,
                });
                slot.state.needs_fetch = true;
                let sequence = envelope.sequence;
                if !slot.defer(envelope, self.inner.tracker.max_deferred()) {
                    tracing::warn!(bucket = %bucket, sequence, "deferred buffer full, dropping update");
                    stats.deferred_dropped();
                }
                Ingested::Deferred {
                    start_fetch: !slot.state.is_fetching,
                }
            }
        }
    }

    /// Ingests a live update and starts a background catch-up if needed.
    pub fn handle_update(&self, envelope: UpdateEnvelope) -> Ingested {
        let bucket = envelope.bucket;
        let ingested = self.ingest(envelope);
        if let Ingested::Deferred { start_fetch: true } = ingested {
            let engine = self.clone();
            tokio::spawn(async move {
                engine.settle(bucket).await;
            });
        }
        ingested
    }

    /// Applies one envelope and moves the bucket forward on success.
    fn apply_one(&self, slot: &mut BucketSlot, envelope: &UpdateEnvelope, direct: bool) -> bool {
        let outcome = lock(&self.inner.store).apply_update(envelope);
        let stats = self.inner.tracker.stats();
        match outcome {
            ApplyOutcome::Applied => {
                slot.state.advance(envelope.sequence, envelope.date);
                if direct {
                    stats.direct_applied();
                } else {
                    stats.bucket_applied();
                }
                tracing::debug!(
                    bucket = %envelope.bucket,
                    sequence = envelope.sequence,
                    kind = envelope.payload.kind(),
                    direct,
                    "applied update"
                );
                self.emit(SyncEvent::Applied {
                    bucket: envelope.bucket,
                    sequence: envelope.sequence,
                    direct,
                });
                true
            }
            ApplyOutcome::Skipped(SkipReason::Storage(reason)) => {
                tracing::warn!(
                    bucket = %envelope.bucket,
                    sequence = envelope.sequence,
                    "update not applied: {}",
                    reason
                );
                slot.state.needs_fetch = true;
                stats.storage_failed();
                self.emit(SyncEvent::StorageFailed {
                    bucket: envelope.bucket,
                    sequence: envelope.sequence,
                });
                false
            }
        }
    }

    /// Applies deferred updates that have become contiguous.
    ///
    /// Covered ones are discarded as duplicates. A remaining gap re-flags
    /// the bucket.
    fn drain_deferred(&self, slot: &mut BucketSlot) {
        let stats = self.inner.tracker.stats();
        while let Some(envelope) = slot.pop_deferred() {
            match slot.state.observe(envelope.sequence) {
                Decision::Duplicate => stats.duplicate_skipped(),
                Decision::Apply => {
                    if !self.apply_one(slot, &envelope, false) {
                        slot.restore_deferred(envelope);
                        return;
                    }
                }
                Decision::Gap { .. } | Decision::Unknown => {
                    slot.restore_deferred(envelope);
                    slot.state.needs_fetch = true;
                    return;
                }
            }
        }
    }

    // -- catch-up --

    /// Runs catch-ups until the bucket is caught up or stops making
    /// progress.
    pub async fn settle(&self, bucket: BucketKey) -> CatchUp {
        loop {
            let before = self.bucket_state(&bucket).and_then(|s| s.sequence);
            let outcome = self.catch_up(bucket).await;
            let still_behind = self
                .bucket_state(&bucket)
                .is_some_and(|s| s.needs_fetch && !s.is_fetching);
            match &outcome {
                CatchUp::Drained { sequence, .. } if still_behind && *sequence != before => continue,
                _ => return outcome,
            }
        }
    }

    /// Fetches and applies everything after the bucket's stored sequence.
    ///
    /// At most one catch-up runs per bucket; a concurrent call returns
    /// [`CatchUp::AlreadyInFlight`] without fetching. Failures are not
    /// retried here.
    pub async fn catch_up(&self, bucket: BucketKey) -> CatchUp {
        let slot = self.inner.tracker.slot(bucket);
        let (epoch, from) = {
            let mut guard = lock(&slot);
            match guard.begin_fetch() {
                Some(epoch) => (epoch, guard.state.sequence),
                None => return CatchUp::AlreadyInFlight,
            }
        };
        tracing::debug!(bucket = %bucket, from = ?from, "catch-up started");
        self.emit(SyncEvent::FetchStarted { bucket, from });

        let cancel = self.cancel_token();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.drain(bucket, &slot, epoch) => result,
        };

        let mut guard = lock(&slot);
        match result {
            Ok(applied) if guard.owns(epoch) => {
                guard.state.is_fetching = false;
                guard.state.needs_fetch = false;
                self.drain_deferred(&mut guard);
                let sequence = guard.state.sequence;
                drop(guard);
                tracing::info!(bucket = %bucket, applied, sequence = ?sequence, "catch-up complete");
                self.emit(SyncEvent::FetchCompleted {
                    bucket,
                    applied,
                    sequence: sequence.unwrap_or_default(),
                });
                CatchUp::Drained { applied, sequence }
            }
            Ok(_) => CatchUp::Failed(FetchError::Cancelled),
            Err(error) => {
                guard.end_fetch(epoch);
                guard.state.needs_fetch = true;
                drop(guard);
                if error != FetchError::Cancelled {
                    self.inner.tracker.stats().fetch_failed();
                }
                tracing::warn!(bucket = %bucket, "catch-up failed: {}", error);
                self.emit(SyncEvent::FetchFailed {
                    bucket,
                    reason: error.to_string(),
                });
                CatchUp::Failed(error)
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = T>,
    ) -> Result<T, FetchError> {
        tokio::time::timeout(self.inner.config.fetch_timeout(), fut)
            .await
            .map_err(|_| FetchError::Timeout)
    }

    /// The fetch loop. Returns how many updates were applied.
    async fn drain(
        &self,
        bucket: BucketKey,
        slot: &Mutex<BucketSlot>,
        epoch: u64,
    ) -> Result<u64, FetchError> {
        let needs_baseline = lock(slot).state.sequence.is_none();
        if needs_baseline {
            let head = self
                .with_timeout(self.inner.fetcher.bucket_head(bucket))
                .await??;
            let mut guard = lock(slot);
            if !guard.owns(epoch) {
                return Err(FetchError::Cancelled);
            }
            self.adopt_baseline(&mut guard, &head)
                .map_err(|e| FetchError::Storage(e.to_string()))?;
        }

        let stats = self.inner.tracker.stats();
        let mut batch = self.inner.config.max_batch_size.max(1);
        let mut narrowed = false;
        let mut applied = 0;

        loop {
            let from = {
                let guard = lock(slot);
                if !guard.owns(epoch) {
                    return Err(FetchError::Cancelled);
                }
                guard.state.sequence.unwrap_or_default()
            };
            let request = FetchRequest {
                bucket,
                from_sequence_exclusive: from,
                max_batch_size: batch,
            };
            let outcome = self
                .with_timeout(self.inner.fetcher.fetch(request))
                .await
                .unwrap_or_else(FetchOutcome::Failed);

            match outcome {
                FetchOutcome::Failed(error) => return Err(error),
                FetchOutcome::TooLong => {
                    stats.too_long();
                    if batch <= 1 {
                        return Err(FetchError::Unbounded(batch));
                    }
                    batch = if narrowed {
                        (batch / 2).max(1)
                    } else {
                        self.inner.config.narrowed_batch_size().min(batch)
                    };
                    narrowed = true;
                    stats.followup();
                    tracing::debug!(bucket = %bucket, from, batch, "range too long, narrowing");
                }
                FetchOutcome::Completed(range) => {
                    stats.fetch_completed();
                    let is_final = range.is_final;
                    let mut guard = lock(slot);
                    if !guard.owns(epoch) {
                        return Err(FetchError::Cancelled);
                    }
                    applied += self.apply_range(&mut guard, bucket, range)?;
                    let reached = guard.state.sequence.unwrap_or_default();
                    drop(guard);

                    if is_final {
                        return Ok(applied);
                    }
                    if reached <= from {
                        return Err(FetchError::Stalled(from));
                    }
                    stats.followup();
                    tracing::debug!(bucket = %bucket, reached, "fetching continuation");
                }
            }
        }
    }

    /// Applies a fetched slice in sequence order, then moves the bucket to
    /// the slice's end.
    ///
    /// Stops at the first storage failure; the bucket keeps the position of
    /// the last committed update.
    fn apply_range(
        &self,
        slot: &mut BucketSlot,
        bucket: BucketKey,
        range: FetchedRange,
    ) -> Result<u64, FetchError> {
        let FetchedRange {
            mut updates,
            new_sequence,
            new_date,
            ..
        } = range;
        updates.sort_by_key(|u| u.sequence);

        let stats = self.inner.tracker.stats();
        let mut applied = 0;
        for envelope in &updates {
            if envelope.bucket != bucket {
                tracing::warn!(
                    bucket = %bucket,
                    other = %envelope.bucket,
                    "ignoring fetched update for another bucket"
                );
                continue;
            }
            if slot
                .state
                .sequence
                .is_some_and(|current| envelope.sequence <= current)
            {
                stats.duplicate_skipped();
                continue;
            }
            // fetched slices are authoritative: holes inside them are
            // sequences with no update
            if !self.apply_one(slot, envelope, false) {
                return Err(FetchError::Storage(format!(
                    "update {} of {} not applied",
                    envelope.sequence, bucket
                )));
            }
            applied += 1;
        }

        let current = slot.state.sequence;
        if current.is_none_or(|current| new_sequence > current) {
            let date = new_date.or(slot.state.date).unwrap_or_else(Utc::now);
            lock(&self.inner.store)
                .record_cursor(&bucket, new_sequence, date)
                .map_err(|e| {
                    stats.storage_failed();
                    FetchError::Storage(e.to_string())
                })?;
            slot.state.advance(new_sequence, date);
        }
        Ok(applied)
    }

    /// Takes a server head as the starting point of an unseen bucket.
    ///
    /// Deferred updates at or below the head are still unwritten, so the
    /// baseline stops just before the lowest of them and the bucket stays
    /// flagged for the fetch that re-delivers them.
    fn adopt_baseline(&self, slot: &mut BucketSlot, head: &BucketHead) -> inl_core::Result<()> {
        if slot.state.sequence.is_some() {
            return Ok(());
        }
        let baseline = slot
            .lowest_deferred()
            .map_or(head.sequence, |lowest| head.sequence.min(lowest - 1));
        lock(&self.inner.store).record_cursor(&head.bucket, baseline, head.date)?;
        slot.state.advance(baseline, head.date);
        if baseline < head.sequence {
            slot.state.needs_fetch = true;
        }
        tracing::debug!(
            bucket = %head.bucket,
            sequence = baseline,
            head = head.sequence,
            "adopted baseline"
        );
        Ok(())
    }

    // -- lifecycle hooks --

    /// Marks the session as connecting.
    pub fn on_connecting(&self, attempt: u32) {
        self.inner.session.set_attempt(attempt);
        self.set_session(SessionState::Connecting);
    }

    /// Marks the session as authenticating.
    pub fn on_authenticating(&self) {
        self.set_session(SessionState::Authenticating);
    }

    /// Handshake completed with the server's current bucket heads.
    ///
    /// Unseen buckets start at their head. Known buckets behind their head
    /// are flagged. Returns every bucket that needs a catch-up.
    pub fn on_connection_established(&self, heads: &[BucketHead]) -> Vec<BucketKey> {
        self.inner.session.set_attempt(0);
        self.set_session(SessionState::Syncing);

        for head in heads {
            let slot = self.inner.tracker.slot(head.bucket);
            let mut guard = lock(&slot);
            match guard.state.sequence {
                None => {
                    if let Err(e) = self.adopt_baseline(&mut guard, head) {
                        tracing::warn!(bucket = %head.bucket, "could not record baseline: {}", e);
                        guard.state.needs_fetch = true;
                    }
                }
                Some(current) if head.sequence > current => {
                    tracing::debug!(
                        bucket = %head.bucket,
                        current,
                        head = head.sequence,
                        "bucket behind"
                    );
                    guard.state.needs_fetch = true;
                }
                Some(current) if head.sequence < current => {
                    tracing::warn!(
                        bucket = %head.bucket,
                        current,
                        head = head.sequence,
                        "server head behind local cursor"
                    );
                }
                Some(_) => {}
            }
        }

        self.inner
            .tracker
            .slots()
            .into_iter()
            .filter(|(_, slot)| lock(slot).state.needs_fetch)
            .map(|(bucket, _)| bucket)
            .collect()
    }

    /// Catches up `buckets` concurrently, then goes live.
    pub async fn resume(&self, buckets: Vec<BucketKey>) {
        let results = join_all(buckets.iter().map(|bucket| self.settle(*bucket))).await;
        let failed = results
            .iter()
            .filter(|r| matches!(r, CatchUp::Failed(_)))
            .count();
        if failed > 0 {
            tracing::warn!(failed, "some buckets are still behind");
        }
        if self.inner.session.get() == SessionState::Syncing {
            self.set_session(SessionState::Live);
        }
    }

    /// The connection dropped.
    ///
    /// In-flight fetches are cancelled; buckets they were draining stay
    /// flagged so the next connection resumes them.
    pub fn on_connection_lost(&self) {
        self.rotate_cancel_token();
        for (_, slot) in self.inner.tracker.slots() {
            lock(&slot).cancel_fetch();
        }
        self.set_session(SessionState::Disconnected);
    }

    /// Discards all bucket state, counters and synced rows.
    pub fn on_logout(&self) -> inl_core::Result<()> {
        self.rotate_cancel_token();
        self.inner.tracker.clear();
        self.inner.tracker.stats().reset();
        lock(&self.inner.store).reset()?;
        self.inner.session.set_attempt(0);
        self.set_session(SessionState::Disconnected);
        self.emit(SyncEvent::Reset);
        tracing::info!("sync state cleared");
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
