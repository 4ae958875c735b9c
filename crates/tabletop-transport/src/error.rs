//! Errors raised by the transport layer.

use std::io;
use std::net::SocketAddr;

/// Errors that can occur while listening, upgrading, or moving bytes.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("bind to {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting a TCP stream failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The peer connected but never completed the WebSocket upgrade.
    #[error("upgrade from {addr} failed: {reason}")]
    Upgrade { addr: SocketAddr, reason: String },

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
}
