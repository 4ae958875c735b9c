//! Session types: the server's record of a player identity.
//!
//! A session ties a stable [`PlayerId`] and display name to whichever
//! connection currently speaks for that player. The connection is
//! replaceable; the identity is not.

use std::time::Instant;

use tabletop_protocol::PlayerId;
use tabletop_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session bookkeeping.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a disconnected identity is remembered before
    /// it expires. Rooms run their own, shorter, reconnect countdowns; this
    /// only bounds how long the server keeps the name around.
    ///
    /// Default: 300 seconds.
    pub reconnect_grace_secs: u64,

    /// Longest accepted client-supplied player id.
    pub max_player_id_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 300,
            max_player_id_len: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a player identity.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(timeout)──→ Expired
///       ↑                            │
///       └──────(handshake again)─────┘
/// ```
#[derive(Debug, Clone)]
pub enum SessionState {
    /// A live connection speaks for this player.
    Connected { connection: ConnectionId },

    /// The last connection closed at `since`.
    Disconnected { since: Instant },

    /// Forgotten on the next cleanup.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single player identity known to the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,

    /// Self-reported display name from the latest handshake.
    pub name: String,

    pub state: SessionState,
}

impl Session {
    /// Returns the live connection, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        match self.state {
            SessionState::Connected { connection } => Some(connection),
            _ => None,
        }
    }
}
