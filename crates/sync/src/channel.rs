// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Fetcher that routes requests through the runner's live connection.
//!
//! Requests travel over an mpsc channel to the task that owns the
//! transport. Request ids are allocated here and the runner matches replies
//! back by id.

use std::sync::atomic::{AtomicU64, Ordering};

use inl_core::protocol::{ClientMessage, ServerMessage, UpdatesResult};
use inl_core::{BucketHead, BucketKey};
use tokio::sync::{mpsc, oneshot};

use crate::error::FetchError;
use crate::fetcher::{FetchFuture, FetchOutcome, FetchRequest, Fetcher};

/// Depth of the request queue between fetchers and the runner.
pub const REQUEST_QUEUE_DEPTH: usize = 64;

/// Server answer to one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerReply {
    Updates(UpdatesResult),
    Head(BucketHead),
    Error { code: i32, message: String },
}

impl ServerReply {
    /// Splits a server message into its request id and reply, if it is one.
    pub fn from_message(msg: ServerMessage) -> Option<(u64, ServerReply)> {
        match msg {
            ServerMessage::UpdatesResult { request_id, result } => {
                Some((request_id, ServerReply::Updates(result)))
            }
            ServerMessage::BucketHead { request_id, head } => {
                Some((request_id, ServerReply::Head(head)))
            }
            ServerMessage::RpcError {
                request_id,
                code,
                message,
            } => Some((request_id, ServerReply::Error { code, message })),
            _ => None,
        }
    }
}

/// A request waiting to be written to the connection.
#[derive(Debug)]
pub struct OutboundRequest {
    pub message: ClientMessage,
    pub reply: oneshot::Sender<ServerReply>,
}

/// [`Fetcher`] backed by a request channel.
#[derive(Debug)]
pub struct ChannelFetcher {
    requests: mpsc::Sender<OutboundRequest>,
    next_id: AtomicU64,
}

impl ChannelFetcher {
    pub fn new(requests: mpsc::Sender<OutboundRequest>) -> Self {
        ChannelFetcher {
            requests,
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a fetcher and the receiving end the runner drains.
    pub fn channel() -> (Self, mpsc::Receiver<OutboundRequest>) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        (Self::new(tx), rx)
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call(&self, message: ClientMessage) -> Result<ServerReply, FetchError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(OutboundRequest { message, reply })
            .await
            .map_err(|_| FetchError::Disconnected)?;
        match answer.await {
            Ok(ServerReply::Error { code, message }) => Err(FetchError::Server { code, message }),
            Ok(reply) => Ok(reply),
            // the runner drops pending replies when the connection goes away
            Err(_) => Err(FetchError::Disconnected),
        }
    }
}

fn unexpected(reply: &ServerReply) -> FetchError {
    FetchError::Transport(format!("unexpected reply: {reply:?}"))
}

impl Fetcher for ChannelFetcher {
    fn fetch(&self, request: FetchRequest) -> FetchFuture<'_, FetchOutcome> {
        Box::pin(async move {
            let message = ClientMessage::GetUpdates {
                request_id: self.next_request_id(),
                bucket: request.bucket,
                from_sequence_exclusive: request.from_sequence_exclusive,
                max_batch_size: request.max_batch_size,
            };
            match self.call(message).await {
                Ok(ServerReply::Updates(result)) => FetchOutcome::from(result),
                Ok(other) => FetchOutcome::Failed(unexpected(&other)),
                Err(error) => FetchOutcome::Failed(error),
            }
        })
    }

    fn bucket_head(&self, bucket: BucketKey) -> FetchFuture<'_, Result<BucketHead, FetchError>> {
        Box::pin(async move {
            let message = ClientMessage::GetBucketHead {
                request_id: self.next_request_id(),
                bucket,
            };
            match self.call(message).await? {
                ServerReply::Head(head) => Ok(head),
                other => Err(unexpected(&other)),
            }
        })
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
