//! Unified error type for the Tabletop server.

use tabletop_protocol::ProtocolError;
use tabletop_room::RoomError;
use tabletop_session::SessionError;
use tabletop_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// Request-level failures never surface here; the handler answers them
/// with an `Error` acknowledgement. This type covers what ends a
/// connection or stops the server.
#[derive(Debug, thiserror::Error)]
pub enum TabletopError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_protocol::{PlayerId, RoomId};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Send(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        let tabletop_err: TabletopError = err.into();
        assert!(matches!(tabletop_err, TabletopError::Transport(_)));
        assert!(tabletop_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let tabletop_err: TabletopError = err.into();
        assert!(matches!(tabletop_err, TabletopError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AlreadyConnected(PlayerId::new("ab12"));
        let tabletop_err: TabletopError = err.into();
        assert!(matches!(tabletop_err, TabletopError::Session(_)));
        assert!(tabletop_err.to_string().contains("ab12"));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotFound(RoomId::new("4821"));
        let tabletop_err: TabletopError = err.into();
        assert!(matches!(tabletop_err, TabletopError::Room(_)));
    }
}
