// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Catch-up fetch interface.
//!
//! A [`Fetcher`] turns a bounded range request into a [`FetchOutcome`]. The
//! engine owns the retry, narrowing and application logic; a fetcher only
//! performs one round trip per call.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use inl_core::protocol::{UpdatesResult, UpdatesResultKind};
use inl_core::{BucketHead, BucketKey, UpdateEnvelope};

use crate::error::FetchError;

/// Request for the updates of `bucket` after `from_sequence_exclusive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub bucket: BucketKey,
    pub from_sequence_exclusive: i64,
    pub max_batch_size: u32,
}

/// A slice of updates returned by a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRange {
    /// Updates in the slice. Not necessarily sorted.
    pub updates: Vec<UpdateEnvelope>,
    /// Bucket position covered by this slice.
    pub new_sequence: i64,
    pub new_date: Option<DateTime<Utc>>,
    /// False when the server has more updates after `new_sequence`.
    pub is_final: bool,
}

/// Result of one fetch round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Completed(FetchedRange),
    /// The range exceeds the server batch limit.
    TooLong,
    Failed(FetchError),
}

impl From<UpdatesResult> for FetchOutcome {
    fn from(result: UpdatesResult) -> Self {
        match result.kind {
            UpdatesResultKind::TooLong => FetchOutcome::TooLong,
            UpdatesResultKind::Empty | UpdatesResultKind::Slice => {
                FetchOutcome::Completed(FetchedRange {
                    updates: result.updates,
                    new_sequence: result.sequence,
                    new_date: result.date,
                    is_final: result.is_final,
                })
            }
        }
    }
}

/// Boxed future returned by [`Fetcher`] methods.
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Performs catch-up round trips against the server.
pub trait Fetcher: Send + Sync {
    /// Fetches one bounded range.
    fn fetch(&self, request: FetchRequest) -> FetchFuture<'_, FetchOutcome>;

    /// Asks the server for the current head of a bucket.
    fn bucket_head(&self, bucket: BucketKey) -> FetchFuture<'_, Result<BucketHead, FetchError>>;
}
