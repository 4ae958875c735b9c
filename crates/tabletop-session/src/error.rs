//! Error types for the session layer.

use tabletop_protocol::PlayerId;
use tabletop_transport::ConnectionId;

/// Errors that can occur while tracking connections and player identities.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A connection with this id is already registered. The newcomer is a
    /// duplicate or zombie handshake and gets closed.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// The connection is not in the registry.
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The identity presented at handshake is unusable.
    #[error("invalid player identity: {0}")]
    InvalidIdentity(String),

    /// The player already has a live connection.
    #[error("player {0} already has an active session")]
    AlreadyConnected(PlayerId),
}
