//! The session manager: stable player identities and their live connection.
//!
//! A client either presents the `PlayerId` it was given earlier or gets a
//! freshly generated one at handshake. Rooms and the matchmaking queue key
//! on that id, so a player who reconnects on a new transport connection is
//! still recognised as the same seat holder.
//!
//! `SessionManager` is a plain `HashMap` wrapper, not thread-safe on its
//! own. The server keeps it behind a mutex and never holds that lock
//! across room operations.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use tabletop_protocol::PlayerId;
use tabletop_transport::ConnectionId;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Tracks every player identity the server currently knows.
///
/// ```text
/// open() ──→ [Connected] ──disconnect()──→ [Disconnected] ──expire_stale()──→ [Expired]
///               ↑                               │                                │
///               └──────────── open(same id) ────┘                        cleanup_expired()
/// ```
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Opens (or resumes) a session for a handshaking connection.
    ///
    /// - `requested = None`: a new identity is generated.
    /// - `requested = Some(id)` that is unknown: the id is adopted as-is,
    ///   so a client keeps its identity across a server restart.
    /// - `requested = Some(id)` that is disconnected or expired: the
    ///   session is resumed on the new connection.
    ///
    /// # Errors
    /// - [`SessionError::InvalidIdentity`] for an empty or oversized id.
    /// - [`SessionError::AlreadyConnected`] if another live connection
    ///   already speaks for that id.
    pub fn open(
        &mut self,
        name: &str,
        requested: Option<PlayerId>,
        connection: ConnectionId,
    ) -> Result<&Session, SessionError> {
        let player_id = match requested {
            Some(id) => {
                self.check_identity(&id)?;
                id
            }
            None => self.fresh_id(),
        };

        if let Some(existing) = self.sessions.get(&player_id) {
            if let SessionState::Connected { connection: live } = existing.state {
                if live != connection {
                    return Err(SessionError::AlreadyConnected(player_id));
                }
            }
        }

        let resumed = self.sessions.contains_key(&player_id);
        let session = Session {
            player_id: player_id.clone(),
            name: display_name(name, &player_id),
            state: SessionState::Connected { connection },
        };
        self.sessions.insert(player_id.clone(), session);

        tracing::info!(%player_id, %connection, resumed, "session opened");
        self.sessions
            .get(&player_id)
            .ok_or(SessionError::NotFound(player_id))
    }

    /// Marks a player as disconnected, if `connection` is still the one
    /// speaking for them.
    ///
    /// A stale close (an older connection closing after the player already
    /// resumed on a newer one) is ignored.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the player is unknown.
    pub fn disconnect(
        &mut self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(player_id)
            .ok_or_else(|| SessionError::NotFound(player_id.clone()))?;

        match session.state {
            SessionState::Connected { connection: live } if live == connection => {
                session.state = SessionState::Disconnected {
                    since: Instant::now(),
                };
                tracing::info!(%player_id, %connection, "player disconnected");
            }
            _ => {
                tracing::debug!(%player_id, %connection, "stale disconnect ignored");
            }
        }
        Ok(())
    }

    /// Expires every disconnected identity older than the grace period.
    ///
    /// Returns the ids that were expired.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        let grace = Duration::from_secs(self.config.reconnect_grace_secs);
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = session.state {
                if since.elapsed() >= grace {
                    session.state = SessionState::Expired;
                    expired.push(session.player_id.clone());
                }
            }
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "sessions expired");
        }
        expired
    }

    /// Drops expired sessions.
    pub fn cleanup_expired(&mut self) {
        self.sessions
            .retain(|_, session| !matches!(session.state, SessionState::Expired));
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// Returns the display name recorded for a player.
    pub fn name_of(&self, player_id: &PlayerId) -> Option<&str> {
        self.sessions.get(player_id).map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn check_identity(&self, id: &PlayerId) -> Result<(), SessionError> {
        let raw = id.as_str();
        if raw.trim().is_empty() {
            return Err(SessionError::InvalidIdentity("empty player id".into()));
        }
        if raw.len() > self.config.max_player_id_len {
            return Err(SessionError::InvalidIdentity(format!(
                "player id longer than {} bytes",
                self.config.max_player_id_len
            )));
        }
        Ok(())
    }

    fn fresh_id(&self) -> PlayerId {
        loop {
            let id = PlayerId(generate_token());
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Generates a random 32-character hex string (128 bits).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Falls back to a short form of the id when the client sent no name.
fn display_name(name: &str, player_id: &PlayerId) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let short: String = player_id.as_str().chars().take(6).collect();
        format!("guest-{short}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_instant_expiry() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 0,
            ..SessionConfig::default()
        })
    }

    fn manager_with_long_grace() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 3600,
            ..SessionConfig::default()
        })
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    // =====================================================================
    // open()
    // =====================================================================

    #[test]
    fn test_open_without_id_generates_hex_identity() {
        let mut mgr = manager_with_long_grace();
        let session = mgr.open("ana", None, conn(1)).expect("open");

        assert_eq!(session.player_id.as_str().len(), 32);
        assert!(session.player_id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(session.name, "ana");
        assert_eq!(session.connection(), Some(conn(1)));
    }

    #[test]
    fn test_open_generated_ids_are_unique() {
        let mut mgr = manager_with_long_grace();
        let a = mgr.open("a", None, conn(1)).unwrap().player_id.clone();
        let b = mgr.open("b", None, conn(2)).unwrap().player_id.clone();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_adopts_unknown_client_id() {
        let mut mgr = manager_with_long_grace();
        let session = mgr
            .open("ana", Some(PlayerId::new("p-ana")), conn(1))
            .unwrap();
        assert_eq!(session.player_id, PlayerId::new("p-ana"));
    }

    #[test]
    fn test_open_rejects_empty_id() {
        let mut mgr = manager_with_long_grace();
        let result = mgr.open("ana", Some(PlayerId::new("  ")), conn(1));
        assert!(matches!(result, Err(SessionError::InvalidIdentity(_))));
    }

    #[test]
    fn test_open_rejects_second_live_connection() {
        let mut mgr = manager_with_long_grace();
        let id = PlayerId::new("p1");
        mgr.open("ana", Some(id.clone()), conn(1)).unwrap();

        let result = mgr.open("ana", Some(id.clone()), conn(2));

        assert!(matches!(result, Err(SessionError::AlreadyConnected(p)) if p == id));
    }

    #[test]
    fn test_open_resumes_disconnected_identity_on_new_connection() {
        let mut mgr = manager_with_long_grace();
        let id = PlayerId::new("p1");
        mgr.open("ana", Some(id.clone()), conn(1)).unwrap();
        mgr.disconnect(&id, conn(1)).unwrap();

        let session = mgr.open("ana", Some(id.clone()), conn(7)).unwrap();

        assert_eq!(session.player_id, id);
        assert_eq!(session.connection(), Some(conn(7)));
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_open_blank_name_falls_back_to_guest() {
        let mut mgr = manager_with_long_grace();
        let session = mgr.open("   ", Some(PlayerId::new("abcdef1234")), conn(1)).unwrap();
        assert_eq!(session.name, "guest-abcdef");
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[test]
    fn test_disconnect_marks_session_disconnected() {
        let mut mgr = manager_with_long_grace();
        let id = PlayerId::new("p1");
        mgr.open("ana", Some(id.clone()), conn(1)).unwrap();

        mgr.disconnect(&id, conn(1)).unwrap();

        let session = mgr.get(&id).unwrap();
        assert!(matches!(session.state, SessionState::Disconnected { .. }));
        assert_eq!(session.connection(), None);
    }

    #[test]
    fn test_disconnect_from_stale_connection_is_ignored() {
        let mut mgr = manager_with_long_grace();
        let id = PlayerId::new("p1");
        mgr.open("ana", Some(id.clone()), conn(1)).unwrap();
        mgr.disconnect(&id, conn(1)).unwrap();
        mgr.open("ana", Some(id.clone()), conn(2)).unwrap();

        // The old socket finally reports its close.
        mgr.disconnect(&id, conn(1)).unwrap();

        assert_eq!(mgr.get(&id).unwrap().connection(), Some(conn(2)));
    }

    #[test]
    fn test_disconnect_unknown_player_returns_not_found() {
        let mut mgr = manager_with_long_grace();
        let result = mgr.disconnect(&PlayerId::new("ghost"), conn(1));
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    // =====================================================================
    // expire_stale() / cleanup_expired()
    // =====================================================================

    #[test]
    fn test_expire_stale_then_cleanup_removes_session() {
        let mut mgr = manager_with_instant_expiry();
        let id = PlayerId::new("p1");
        mgr.open("ana", Some(id.clone()), conn(1)).unwrap();
        mgr.disconnect(&id, conn(1)).unwrap();

        let expired = mgr.expire_stale();
        assert_eq!(expired, vec![id.clone()]);

        mgr.cleanup_expired();
        assert!(mgr.get(&id).is_none());
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_expire_stale_keeps_connected_sessions() {
        let mut mgr = manager_with_instant_expiry();
        mgr.open("ana", Some(PlayerId::new("p1")), conn(1)).unwrap();

        assert!(mgr.expire_stale().is_empty());
        mgr.cleanup_expired();
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_expire_stale_long_grace_keeps_disconnected() {
        let mut mgr = manager_with_long_grace();
        let id = PlayerId::new("p1");
        mgr.open("ana", Some(id.clone()), conn(1)).unwrap();
        mgr.disconnect(&id, conn(1)).unwrap();

        assert!(mgr.expire_stale().is_empty());
        assert_eq!(mgr.name_of(&id), Some("ana"));
    }
}
