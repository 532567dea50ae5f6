// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection to the realtime server.
//!
//! The engine never sees wire bytes. A [`Transport`] carries decoded
//! [`ClientMessage`]/[`ServerMessage`] values; the WebSocket implementation
//! frames them as JSON text messages.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use inl_core::protocol::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// A bidirectional message channel to the realtime server.
pub trait Transport: Send + Sync {
    /// Opens a connection to `url`.
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()>;

    /// Closes the connection. Closing an unconnected transport is a no-op.
    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    /// Sends one message.
    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()>;

    /// Receives the next message.
    ///
    /// Returns `None` once the server closes the connection.
    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>>;

    fn is_connected(&self) -> bool;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsHalves {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

/// WebSocket transport using tokio-tungstenite.
#[derive(Default)]
pub struct WebSocketTransport {
    ws: Option<WsHalves>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        WebSocketTransport { ws: None }
    }
}

fn decode(text: &str) -> TransportResult<ServerMessage> {
    ServerMessage::from_json(text).map_err(|e| TransportError::SerializationError(e.to_string()))
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            let (sink, stream) = ws_stream.split();
            self.ws = Some(WsHalves { sink, stream });
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if let Some(mut ws) = self.ws.take() {
                // The peer may already be gone; closing is best effort.
                let _ = ws.sink.close().await;
            }
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let json = msg
                .to_json()
                .map_err(|e| TransportError::SerializationError(e.to_string()))?;
            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            let sent = match ws.sink.send(Message::Text(json.into())).await {
                Ok(()) => ws.sink.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                self.ws = None;
                return Err(TransportError::SendFailed(e.to_string()));
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;
            loop {
                match ws.stream.next().await {
                    Some(Ok(Message::Text(text))) => return decode(&text).map(Some),
                    Some(Ok(Message::Binary(bytes))) => {
                        let text = std::str::from_utf8(&bytes)
                            .map_err(|e| TransportError::SerializationError(e.to_string()))?;
                        return decode(text).map(Some);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        self.ws = None;
                        return Ok(None);
                    }
                    // ping/pong frames are answered by tungstenite
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        self.ws = None;
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
