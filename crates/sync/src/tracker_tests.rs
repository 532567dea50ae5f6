// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;
use inl_core::{PeerId, Update};
use serde_json::json;
use yare::parameterized;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
}

fn envelope(sequence: i64) -> UpdateEnvelope {
    UpdateEnvelope::new(
        BucketKey::User,
        sequence,
        ts(sequence),
        Update::UserSettings {
            settings: json!({ "seq": sequence }),
        },
    )
}

#[parameterized(
    duplicate_below = { 3, Decision::Duplicate },
    duplicate_equal = { 5, Decision::Duplicate },
    contiguous = { 6, Decision::Apply },
    gap = { 8, Decision::Gap { expected: 6, received: 8 } },
)]
fn observe_classifies(incoming: i64, expected: Decision) {
    let state = BucketState::at(5, ts(5));
    assert_eq!(state.observe(incoming), expected);
}

#[test]
fn observe_without_baseline_is_unknown() {
    assert_eq!(BucketState::default().observe(1), Decision::Unknown);
}

#[test]
fn date_never_overrides_sequence() {
    let mut state = BucketState::at(5, ts(100));
    assert_eq!(state.observe(6), Decision::Apply);
    // an older date on a newer sequence still advances
    assert!(state.advance(6, ts(1)));
    assert_eq!(state.sequence, Some(6));
    assert_eq!(state.date, Some(ts(1)));
}

#[test]
fn advance_never_regresses() {
    let mut state = BucketState::at(10, ts(10));
    assert!(!state.advance(7, ts(7)));
    assert!(!state.advance(10, ts(11)));
    assert_eq!(state.sequence, Some(10));
    assert_eq!(state.date, Some(ts(10)));
}

#[test]
fn deferred_buffer_is_ordered_and_bounded() {
    let mut slot = BucketSlot::default();
    assert!(slot.defer(envelope(9), 2));
    assert!(slot.defer(envelope(7), 2));
    assert!(slot.defer(envelope(9), 2), "re-deferring a held sequence is accepted");
    assert!(!slot.defer(envelope(8), 2));
    assert_eq!(slot.deferred_len(), 2);

    assert_eq!(slot.pop_deferred().unwrap().sequence, 7);
    assert_eq!(slot.pop_deferred().unwrap().sequence, 9);
    assert!(slot.pop_deferred().is_none());
}

#[test]
fn restore_deferred_puts_update_back() {
    let mut slot = BucketSlot::default();
    slot.defer(envelope(4), 10);
    let taken = slot.pop_deferred().unwrap();
    slot.restore_deferred(taken);
    assert_eq!(slot.deferred_len(), 1);
}

#[test]
fn only_one_fetch_claim_at_a_time() {
    let mut slot = BucketSlot::default();
    let epoch = slot.begin_fetch().unwrap();
    assert!(slot.state.is_fetching);
    assert!(slot.state.needs_fetch);
    assert!(slot.begin_fetch().is_none());

    slot.end_fetch(epoch);
    assert!(!slot.state.is_fetching);
    assert!(slot.state.needs_fetch);
    assert!(slot.begin_fetch().is_some());
}

#[test]
fn cancelled_fetch_loses_ownership() {
    let mut slot = BucketSlot::default();
    let stale = slot.begin_fetch().unwrap();
    slot.cancel_fetch();
    assert!(!slot.state.is_fetching);
    assert!(slot.state.needs_fetch);
    assert!(!slot.owns(stale));

    let fresh = slot.begin_fetch().unwrap();
    // a late release from the cancelled fetch must not clear the new claim
    slot.end_fetch(stale);
    assert!(slot.state.is_fetching);
    assert!(slot.owns(fresh));
}

#[test]
fn tracker_seeds_and_lists_buckets_in_order() {
    let tracker = Tracker::new(16);
    tracker.seed(BucketKey::Space(2), 40, ts(40));
    tracker.seed(BucketKey::User, 7, ts(7));
    tracker.seed(BucketKey::Chat(PeerId::User(5)), 3, ts(3));

    assert_eq!(tracker.len(), 3);
    let buckets: Vec<_> = tracker.snapshot().into_iter().map(|b| b.bucket).collect();
    assert_eq!(
        buckets,
        vec![
            BucketKey::User,
            BucketKey::Space(2),
            BucketKey::Chat(PeerId::User(5))
        ]
    );
    assert_eq!(tracker.state(&BucketKey::User).unwrap().sequence, Some(7));
}

#[test]
fn slot_is_shared_between_lookups() {
    let tracker = Tracker::new(16);
    let a = tracker.slot(BucketKey::User);
    lock(&a).state.needs_fetch = true;
    let b = tracker.get(&BucketKey::User).unwrap();
    assert!(lock(&b).state.needs_fetch);
    assert!(tracker.get(&BucketKey::Space(1)).is_none());
}

#[test]
fn clear_forgets_buckets_and_cancels_fetches() {
    let tracker = Tracker::new(16);
    let slot = tracker.slot(BucketKey::User);
    let epoch = lock(&slot).begin_fetch().unwrap();

    tracker.clear();
    assert!(tracker.is_empty());
    assert!(!lock(&slot).owns(epoch));
}
