//! The connection registry: one entry per live transport connection.
//!
//! Pure bookkeeping. Registration either succeeds or is rejected as a
//! duplicate; nothing here retries or fails in any other way. Closing a
//! connection removes its entry and hands the entry back so the caller can
//! fan the disconnect out to every room-lifecycle owner.

use std::collections::HashMap;

use tabletop_protocol::PlayerId;
use tabletop_transport::{ConnectionId, ConnectionInfo};

use crate::SessionError;

/// A registered connection and the player it speaks for, once known.
#[derive(Debug, Clone)]
pub struct RegisteredConnection {
    pub info: ConnectionInfo,
    /// Set after a successful handshake.
    pub player_id: Option<PlayerId>,
}

/// Tracks every live transport connection.
///
/// Not thread-safe on its own; the server owns one behind a mutex.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, RegisteredConnection>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly accepted connection.
    ///
    /// # Errors
    /// [`SessionError::AlreadyRegistered`] if the id is already known. The
    /// existing entry is left untouched.
    pub fn register(&mut self, info: ConnectionInfo) -> Result<(), SessionError> {
        if self.connections.contains_key(&info.id) {
            tracing::warn!(
                connection_id = %info.id,
                remote_addr = %info.remote_addr,
                "duplicate connection registration rejected"
            );
            return Err(SessionError::AlreadyRegistered(info.id));
        }
        self.connections.insert(
            info.id,
            RegisteredConnection {
                info,
                player_id: None,
            },
        );
        tracing::debug!(
            connection_id = %info.id,
            remote_addr = %info.remote_addr,
            live = self.connections.len(),
            "connection registered"
        );
        Ok(())
    }

    /// Associates a player identity with a registered connection.
    pub fn bind_player(
        &mut self,
        id: ConnectionId,
        player_id: PlayerId,
    ) -> Result<(), SessionError> {
        let entry = self
            .connections
            .get_mut(&id)
            .ok_or(SessionError::UnknownConnection(id))?;
        entry.player_id = Some(player_id);
        Ok(())
    }

    /// Removes a connection, returning what was known about it.
    ///
    /// Returns `None` if the connection was never registered or already
    /// removed, so a double close is harmless.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<RegisteredConnection> {
        let removed = self.connections.remove(&id);
        if removed.is_some() {
            tracing::debug!(
                connection_id = %id,
                live = self.connections.len(),
                "connection unregistered"
            );
        }
        removed
    }

    /// Looks up a live connection.
    pub fn get(&self, id: ConnectionId) -> Option<&RegisteredConnection> {
        self.connections.get(&id)
    }

    /// Returns the player bound to a connection.
    pub fn player_of(&self, id: ConnectionId) -> Option<&PlayerId> {
        self.connections.get(&id)?.player_id.as_ref()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
