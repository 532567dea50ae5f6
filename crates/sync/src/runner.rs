// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection driver.
//!
//! Owns the transport and moves the session through
//! connect, authenticate, sync and live. Live updates go to the engine's
//! fast path; catch-up requests from the engine's [`ChannelFetcher`] are
//! written to the connection and their replies routed back by request id.
//! When the connection drops the runner reconnects with exponential
//! backoff.

use std::collections::HashMap;
use std::time::Duration;

use inl_core::protocol::{ClientMessage, ServerMessage};
use inl_core::{BucketHead, Store};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelFetcher, OutboundRequest, ServerReply};
use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;

/// Version reported in the connection handshake.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Why a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Shutdown,
    ConnectionLost,
}

/// Drives one engine over one transport.
pub struct SyncRunner<T, S> {
    config: SyncConfig,
    transport: T,
    token: String,
    engine: SyncEngine<S, ChannelFetcher>,
    requests: mpsc::Receiver<OutboundRequest>,
    shutdown: CancellationToken,
}

impl<T, S> SyncRunner<T, S>
where
    T: Transport,
    S: Store + 'static,
{
    /// Builds the engine over `store` and wires its fetcher to this runner.
    pub fn new(
        config: SyncConfig,
        transport: T,
        store: S,
        token: impl Into<String>,
    ) -> SyncResult<Self> {
        let (fetcher, requests) = ChannelFetcher::channel();
        let engine = SyncEngine::new(config.clone(), store, fetcher)?;
        Ok(SyncRunner {
            config,
            transport,
            token: token.into(),
            engine,
            requests,
            shutdown: CancellationToken::new(),
        })
    }

    /// Handle to the engine driven by this runner.
    pub fn engine(&self) -> SyncEngine<S, ChannelFetcher> {
        self.engine.clone()
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Keeps the session connected until shutdown.
    ///
    /// Returns an error only for conditions a reconnect cannot fix: a
    /// rejected token, exhausted connect retries or a store failure.
    pub async fn run(&mut self) -> SyncResult<()> {
        loop {
            match self.run_once().await {
                Ok(SessionEnd::Shutdown) => return Ok(()),
                Ok(SessionEnd::ConnectionLost) => {
                    tracing::info!("connection lost, reconnecting");
                }
                Err(
                    e @ (SyncError::Transport(_)
                    | SyncError::HandshakeTimeout
                    | SyncError::NotConnected),
                ) => {
                    tracing::warn!("session setup failed: {}", e);
                }
                Err(e) => return Err(e),
            }
            let pause = Duration::from_millis(self.config.reconnect_initial_delay_ms);
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Runs a single connection cycle.
    pub async fn run_once(&mut self) -> SyncResult<SessionEnd> {
        if let Err(e) = self.connect_with_retry().await {
            if self.shutdown.is_cancelled() {
                return Ok(SessionEnd::Shutdown);
            }
            self.engine.on_connection_lost();
            return Err(e);
        }

        let heads = match self.authenticate().await {
            Ok(heads) => heads,
            Err(e) => {
                self.close().await;
                return Err(e);
            }
        };
        tracing::info!(buckets = heads.len(), "session open");

        let end = self.pump(&heads).await;
        self.close().await;
        Ok(end)
    }

    /// Connects with exponential backoff.
    ///
    /// `reconnect_max_retries` of 0 retries forever.
    pub async fn connect_with_retry(&mut self) -> SyncResult<()> {
        let max_retries = self.config.reconnect_max_retries;
        let max_delay_ms = self.config.reconnect_max_delay_secs.saturating_mul(1000);
        let mut delay_ms = self.config.reconnect_initial_delay_ms;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.engine.on_connecting(attempt);

            match self.transport.connect(&self.config.url).await {
                Ok(()) => {
                    tracing::debug!(attempt, url = %self.config.url, "connected");
                    return Ok(());
                }
                Err(e) if max_retries > 0 && attempt >= max_retries => {
                    tracing::warn!(attempt, "giving up connecting: {}", e);
                    return Err(SyncError::MaxRetriesExceeded);
                }
                Err(e) => {
                    tracing::debug!(attempt, delay_ms, "connect failed: {}", e);
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(SyncError::NotConnected),
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            }
            delay_ms = delay_ms.saturating_mul(2).min(max_delay_ms);
        }
    }

    /// Sends the session token and waits for the bucket heads.
    async fn authenticate(&mut self) -> SyncResult<Vec<BucketHead>> {
        self.engine.on_authenticating();
        self.transport
            .send(ClientMessage::connection_init(&self.token, CLIENT_VERSION))
            .await?;

        tokio::time::timeout(self.config.handshake_timeout(), self.await_open())
            .await
            .map_err(|_| SyncError::HandshakeTimeout)?
    }

    async fn await_open(&mut self) -> SyncResult<Vec<BucketHead>> {
        loop {
            match self.transport.recv().await? {
                Some(ServerMessage::ConnectionOpen { buckets }) => return Ok(buckets),
                Some(ServerMessage::ConnectionError { message }) => {
                    return Err(SyncError::AuthenticationFailed(message));
                }
                Some(other) => {
                    tracing::debug!(?other, "ignoring message before handshake");
                }
                None => return Err(SyncError::NotConnected),
            }
        }
    }

    /// Routes traffic until the connection drops or shutdown is requested.
    async fn pump(&mut self, heads: &[BucketHead]) -> SessionEnd {
        let behind = self.engine.on_connection_established(heads);
        let resume = tokio::spawn({
            let engine = self.engine.clone();
            async move { engine.resume(behind).await }
        });

        let stats_every = self.config.stats_interval_secs;
        let mut stats_tick = tokio::time::interval(Duration::from_secs(stats_every.max(1)));
        stats_tick.reset();

        let mut pending: HashMap<u64, oneshot::Sender<ServerReply>> = HashMap::new();
        let end = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break SessionEnd::Shutdown,

                Some(request) = self.requests.recv() => {
                    let id = request.message.request_id();
                    if let Err(e) = self.transport.send(request.message).await {
                        tracing::warn!("send failed: {}", e);
                        break SessionEnd::ConnectionLost;
                    }
                    if let Some(id) = id {
                        track_request(&mut pending, id, request.reply);
                    }
                }

                received = self.transport.recv() => match received {
                    Ok(Some(ServerMessage::Update(envelope))) => {
                        self.engine.handle_update(envelope);
                    }
                    Ok(Some(ServerMessage::ConnectionError { message })) => {
                        tracing::warn!("server closed session: {}", message);
                        break SessionEnd::ConnectionLost;
                    }
                    Ok(Some(msg)) => route_reply(&mut pending, msg),
                    Ok(None) => break SessionEnd::ConnectionLost,
                    Err(e) => {
                        tracing::warn!("receive failed: {}", e);
                        break SessionEnd::ConnectionLost;
                    }
                },

                _ = stats_tick.tick(), if stats_every > 0 => {
                    let stats = self.engine.get_sync_stats();
                    tracing::info!(
                        state = %self.engine.session().status_string(),
                        buckets = stats.buckets_tracked,
                        direct = stats.direct_updates_applied,
                        applied = stats.bucket_updates_applied,
                        skipped = stats.bucket_updates_skipped,
                        duplicates = stats.bucket_updates_duplicate_skipped,
                        fetches = stats.bucket_fetch_count,
                        failures = stats.bucket_fetch_failures,
                        "sync stats"
                    );
                }
            }
        };

        resume.abort();
        // waiting fetchers see their reply channel close
        pending.clear();
        while self.requests.try_recv().is_ok() {}
        end
    }

    async fn close(&mut self) {
        self.engine.on_connection_lost();
        if let Err(e) = self.transport.disconnect().await {
            tracing::debug!("disconnect failed: {}", e);
        }
    }
}

/// Remembers a request awaiting its reply, forgetting requests whose
/// caller gave up (timed out or cancelled).
fn track_request(
    pending: &mut HashMap<u64, oneshot::Sender<ServerReply>>,
    id: u64,
    reply: oneshot::Sender<ServerReply>,
) {
    pending.retain(|_, tx| !tx.is_closed());
    pending.insert(id, reply);
}

fn route_reply(pending: &mut HashMap<u64, oneshot::Sender<ServerReply>>, msg: ServerMessage) {
    let Some((id, reply)) = ServerReply::from_message(msg) else {
        return;
    };
    match pending.remove(&id) {
        // the fetch may have timed out and dropped its receiver
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => tracing::debug!(request_id = id, "reply for unknown request"),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
