// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! inl-sync: bucketed realtime sync engine
//!
//! Tracks a sequence position per bucket, applies in-order updates
//! directly, catches up gaps with bounded fetches, and drives the session
//! through connect, authenticate, sync and live over a [`Transport`].

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod lifecycle;
pub mod runner;
pub mod stats;
pub mod tracker;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use channel::ChannelFetcher;
pub use config::SyncConfig;
pub use engine::{CatchUp, Ingested, SyncEngine};
pub use error::{FetchError, SyncError, SyncResult};
pub use events::SyncEvent;
pub use fetcher::{FetchOutcome, FetchRequest, FetchedRange, Fetcher};
pub use lifecycle::{SessionState, SharedSessionState};
pub use runner::{SessionEnd, SyncRunner};
pub use stats::{BucketSnapshot, SyncSnapshot, SyncStats};
pub use tracker::{BucketState, Decision};
pub use transport::{Transport, TransportError, WebSocketTransport};
