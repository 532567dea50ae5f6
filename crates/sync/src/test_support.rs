// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for unit tests: a scripted fetcher, a store that can be
//! made to fail, and an in-memory transport.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use inl_core::db::SqliteTxn;
use inl_core::protocol::{ClientMessage, ServerMessage};
use inl_core::{
    BucketHead, BucketKey, Database, Error, Message, MessageId, PeerId, Store, StoredCursor,
    Update, UpdateEnvelope,
};
use tokio::sync::Notify;

use crate::error::FetchError;
use crate::fetcher::{FetchFuture, FetchOutcome, FetchRequest, FetchedRange, Fetcher};
use crate::transport::{Transport, TransportError, TransportFuture};

pub const PEER: PeerId = PeerId::User(5);
pub const CHAT: BucketKey = BucketKey::Chat(PEER);

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
}

pub fn new_message(id: i64) -> Update {
    Update::NewMessage {
        message: Message {
            id: MessageId(id),
            peer: PEER,
            from_id: 5,
            date: ts(id),
            text: Some(format!("m{id}")),
            out: false,
        },
    }
}

/// A chat-bucket envelope carrying new message `sequence`.
pub fn message_update(sequence: i64) -> UpdateEnvelope {
    UpdateEnvelope::new(CHAT, sequence, ts(sequence), new_message(sequence))
}

pub fn read_update(sequence: i64, read_max_id: i64) -> UpdateEnvelope {
    UpdateEnvelope::new(
        CHAT,
        sequence,
        ts(sequence),
        Update::ReadMaxId {
            peer: PEER,
            read_max_id: MessageId(read_max_id),
            unread_count: 0,
        },
    )
}

/// A final slice of chat messages `from..=to`.
pub fn slice(from: i64, to: i64, is_final: bool) -> FetchOutcome {
    FetchOutcome::Completed(FetchedRange {
        updates: (from..=to).map(message_update).collect(),
        new_sequence: to,
        new_date: Some(ts(to)),
        is_final,
    })
}

// -- fetcher --

#[derive(Default)]
struct FetcherState {
    outcomes: Mutex<VecDeque<FetchOutcome>>,
    heads: Mutex<HashMap<BucketKey, BucketHead>>,
    requests: Mutex<Vec<FetchRequest>>,
    calls: AtomicUsize,
    gated: AtomicBool,
    gate: Notify,
    started: Notify,
}

/// Fetcher answering from a script.
///
/// With no scripted outcome left it answers an empty final slice at the
/// requested position.
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<FetcherState>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetcher whose calls block until [`release`](Self::release).
    pub fn gated() -> Self {
        let fetcher = Self::default();
        fetcher.state.gated.store(true, Ordering::SeqCst);
        fetcher
    }

    pub fn push(&self, outcome: FetchOutcome) -> &Self {
        self.state.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    pub fn set_head(&self, head: BucketHead) {
        self.state.heads.lock().unwrap().insert(head.bucket, head);
    }

    /// Lets one blocked call proceed.
    pub fn release(&self) {
        self.state.gate.notify_one();
    }

    /// Waits until a fetch call has started.
    pub async fn wait_started(&self) {
        self.state.started.notified().await;
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, request: FetchRequest) -> FetchFuture<'_, FetchOutcome> {
        Box::pin(async move {
            self.state.requests.lock().unwrap().push(request);
            self.state.calls.fetch_add(1, Ordering::SeqCst);
            self.state.started.notify_one();
            if self.state.gated.load(Ordering::SeqCst) {
                self.state.gate.notified().await;
            }
            let scripted = self.state.outcomes.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| {
                FetchOutcome::Completed(FetchedRange {
                    updates: Vec::new(),
                    new_sequence: request.from_sequence_exclusive,
                    new_date: None,
                    is_final: true,
                })
            })
        })
    }

    fn bucket_head(&self, bucket: BucketKey) -> FetchFuture<'_, Result<BucketHead, FetchError>> {
        Box::pin(async move {
            self.state
                .heads
                .lock()
                .unwrap()
                .get(&bucket)
                .cloned()
                .ok_or_else(|| FetchError::Server {
                    code: 1,
                    message: format!("no head for {bucket}"),
                })
        })
    }
}

// -- store --

/// Database whose transactions fail while `fail` is set.
pub struct FlakyStore {
    pub db: Database,
    pub fail: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let fail = Arc::new(AtomicBool::new(false));
        let store = FlakyStore {
            db: Database::open_in_memory().unwrap(),
            fail: Arc::clone(&fail),
        };
        (store, fail)
    }
}

impl Store for FlakyStore {
    type Txn<'a> = SqliteTxn<'a>;

    fn begin(&mut self) -> inl_core::Result<SqliteTxn<'_>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        self.db.begin()
    }

    fn load_cursors(&self) -> inl_core::Result<Vec<StoredCursor>> {
        self.db.load_cursors()
    }

    fn reset(&mut self) -> inl_core::Result<()> {
        self.db.reset()
    }
}

// -- transport --

type Responder = Box<dyn FnMut(&ClientMessage) -> Option<ServerMessage> + Send>;

#[derive(Default)]
struct Wire {
    connected: bool,
    closed: bool,
    connect_failures: u32,
    connects: u32,
    incoming: VecDeque<ServerMessage>,
    outgoing: Vec<ClientMessage>,
    responder: Option<Responder>,
}

#[derive(Default)]
struct WireShared {
    wire: Mutex<Wire>,
    readable: Notify,
}

/// In-memory transport. Clones share the same wire, so a test keeps one
/// clone to script the server side.
#[derive(Clone, Default)]
pub struct MockTransport {
    shared: Arc<WireShared>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` connect attempts fail.
    pub fn fail_connects(&self, n: u32) {
        self.shared.wire.lock().unwrap().connect_failures = n;
    }

    /// Answers every sent message through `f`.
    pub fn respond_with(
        &self,
        f: impl FnMut(&ClientMessage) -> Option<ServerMessage> + Send + 'static,
    ) {
        self.shared.wire.lock().unwrap().responder = Some(Box::new(f));
    }

    /// Queues a message from the server.
    pub fn push(&self, msg: ServerMessage) {
        self.shared.wire.lock().unwrap().incoming.push_back(msg);
        self.shared.readable.notify_one();
    }

    /// Closes the connection from the server side once queued messages
    /// have been read.
    pub fn close(&self) {
        self.shared.wire.lock().unwrap().closed = true;
        self.shared.readable.notify_one();
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.shared.wire.lock().unwrap().outgoing.clone()
    }

    pub fn connects(&self) -> u32 {
        self.shared.wire.lock().unwrap().connects
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _url: &str) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut wire = self.shared.wire.lock().unwrap();
            wire.connects += 1;
            if wire.connect_failures > 0 {
                wire.connect_failures -= 1;
                return Err(TransportError::ConnectionFailed("mock failure".into()));
            }
            wire.connected = true;
            wire.closed = false;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.shared.wire.lock().unwrap().connected = false;
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut wire = self.shared.wire.lock().unwrap();
            if !wire.connected {
                return Err(TransportError::ConnectionClosed);
            }
            let reply = wire.responder.as_mut().and_then(|f| f(&msg));
            wire.outgoing.push(msg);
            if let Some(reply) = reply {
                wire.incoming.push_back(reply);
                drop(wire);
                self.shared.readable.notify_one();
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            loop {
                {
                    let mut wire = self.shared.wire.lock().unwrap();
                    if !wire.connected {
                        return Err(TransportError::ConnectionClosed);
                    }
                    if let Some(msg) = wire.incoming.pop_front() {
                        return Ok(Some(msg));
                    }
                    if wire.closed {
                        wire.connected = false;
                        return Ok(None);
                    }
                }
                self.shared.readable.notified().await;
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.shared.wire.lock().unwrap().connected
    }
}
