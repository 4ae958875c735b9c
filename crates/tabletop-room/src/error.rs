//! Error types for the room layer.

use tabletop_protocol::{ErrorKind, PlayerId, RoomId};

/// Errors returned by room, room-store and matchmaking operations.
///
/// Every variant is a tagged result for the request's acknowledgement;
/// none of them is fatal to the room that produced it.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomId),

    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("not your turn")]
    NotPlayerTurn,

    #[error("player {0} is not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    /// The move failed server-side validation. State was not touched.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// The room is `waiting` or `finished`.
    #[error("game is not active")]
    GameNotActive,

    #[error("player {0} is already queued or in an active room")]
    AlreadyInQueueOrGame(PlayerId),

    #[error("unknown game kind {0:?}")]
    UnknownGame(String),

    /// Room options or a move payload could not be decoded or are out of
    /// range.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A defect inside a game rule or the room actor. The room keeps its
    /// previous state and keeps running.
    #[error("internal error: {0}")]
    Internal(String),

    /// The room's actor is gone (deleted between lookup and use).
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// The wire-level kind reported to the client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::Unavailable(_) => ErrorKind::RoomNotFound,
            Self::AlreadyExists(_) => ErrorKind::RoomAlreadyExists,
            Self::RoomFull(_) => ErrorKind::RoomFull,
            Self::NotPlayerTurn => ErrorKind::NotPlayerTurn,
            Self::NotInRoom(..) => ErrorKind::PlayerNotInRoom,
            Self::InvalidMove(_) => ErrorKind::InvalidMove,
            Self::GameNotActive => ErrorKind::GameNotActive,
            Self::AlreadyInQueueOrGame(_) => ErrorKind::AlreadyInQueueOrGame,
            Self::UnknownGame(_) | Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }
}
