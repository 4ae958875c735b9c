//! Core protocol types for Tabletop's wire format.
//!
//! Everything in this module travels between client and server: it is
//! serialized by a [`Codec`](crate::Codec), sent over a connection, and
//! decoded on the other side. Game-specific data (board states, moves)
//! is carried as opaque bytes so this crate stays independent of any
//! particular game.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable player identity.
///
/// Issued by the server at handshake (or presented again by a client that
/// already has one) and kept for the life of a match. It is deliberately
/// separate from the transport's connection id: a player who loses their
/// network gets a new connection but keeps the same `PlayerId`, which is
/// what reconnection and the matchmaking queue key on.
///
/// `#[serde(transparent)]` makes `PlayerId("ab12")` serialize as the bare
/// string `"ab12"` instead of a one-field object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Wraps a raw identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifier of a room (one match).
///
/// Either supplied by the client when creating a room or generated by the
/// server. Codes are typed by hand, so lookups also accept a
/// case-insensitive match (see [`RoomId::matches_ignore_case`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Wraps a raw room id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if both ids are equal ignoring ASCII case.
    pub fn matches_ignore_case(&self, other: &RoomId) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A seat at the table, the stable *role* of a player inside a room.
///
/// Seats are zero-based on the wire and displayed one-based, so
/// `Seat(0)` is "player1". A seat is assigned on join and never
/// reassigned while the room lives; turn arbitration is done on seats,
/// never on connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seat(pub u8);

impl Seat {
    /// The first seat ("player1").
    pub const FIRST: Seat = Seat(0);

    /// Returns the zero-based seat index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the seat after this one in a table of `seat_count` seats,
    /// wrapping around to the first seat.
    pub fn next(self, seat_count: usize) -> Seat {
        if seat_count == 0 {
            return self;
        }
        Seat(((self.index() + 1) % seat_count) as u8)
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player{}", self.0 as u32 + 1)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who inside a room should receive a game event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every seated player.
    All,

    /// One seat only.
    Seat(Seat),

    /// Everyone except the given seat.
    AllExcept(Seat),
}

impl Recipient {
    /// Returns `true` if `seat` is addressed by this recipient.
    pub fn includes(&self, seat: Seat) -> bool {
        match self {
            Self::All => true,
            Self::Seat(s) => *s == seat,
            Self::AllExcept(s) => *s != seat,
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Delivery guarantee for a message.
///
/// Board games only need reliable, ordered delivery; the other variants
/// exist so the envelope format stays compatible with transports that
/// offer them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Channel {
    /// Delivered in order, no loss.
    #[default]
    ReliableOrdered,

    /// Delivered, possibly out of order.
    ReliableUnordered,

    /// May be lost or reordered.
    Unreliable,
}

// ---------------------------------------------------------------------------
// Match results
// ---------------------------------------------------------------------------

/// The terminal result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "seat")]
pub enum Outcome {
    /// The given seat won.
    Winner(Seat),
    /// Nobody won.
    Draw,
}

/// Why a match ended. Displayed to players as a human-readable cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The game rules reached a terminal position.
    Completed,
    /// A seat surrendered.
    Surrendered,
    /// A seat left the room on purpose.
    OpponentLeft,
    /// A seat's connection dropped while the match was underway.
    OpponentDisconnected,
    /// A disconnected seat did not come back before its countdown ran out.
    TimeExpired,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Completed => "game over",
            Self::Surrendered => "opponent surrendered",
            Self::OpponentLeft => "opponent left",
            Self::OpponentDisconnected => "opponent disconnected",
            Self::TimeExpired => "time expired",
        };
        f.write_str(text)
    }
}

// ---------------------------------------------------------------------------
// Errors on the wire
// ---------------------------------------------------------------------------

/// The kind of a request failure, as reported to the client.
///
/// These are *kinds*, not messages: the accompanying `message` string in
/// [`SystemMessage::Error`] carries the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RoomNotFound,
    RoomAlreadyExists,
    RoomFull,
    NotPlayerTurn,
    PlayerNotInRoom,
    InvalidMove,
    GameNotActive,
    AlreadyInQueueOrGame,
    /// Malformed request, unknown game kind, bad options or version.
    BadRequest,
    /// A defect inside a handler. The process keeps running.
    InternalError,
}

impl ErrorKind {
    /// HTTP-style status code for clients that prefer numbers.
    pub fn code(self) -> u16 {
        match self {
            Self::BadRequest | Self::InvalidMove => 400,
            Self::PlayerNotInRoom => 403,
            Self::RoomNotFound => 404,
            Self::RoomAlreadyExists
            | Self::RoomFull
            | Self::NotPlayerTurn
            | Self::GameNotActive
            | Self::AlreadyInQueueOrGame => 409,
            Self::InternalError => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// SystemMessage
// ---------------------------------------------------------------------------

/// A seat as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatInfo {
    pub seat: Seat,
    pub name: String,
    /// `false` while the seat's connection is gone but the seat is held.
    pub connected: bool,
}

/// A joinable room in a room listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    pub room_id: RoomId,
    /// Game kind, e.g. `"checkers"`.
    pub game: String,
    pub player_count: usize,
    pub max_players: usize,
}

/// Messages handled by the server framework rather than by a game.
///
/// Requests flow client → server; acknowledgements answer exactly one
/// request (paired through [`Envelope::ack`]); broadcasts are pushed to
/// every member of a room, including the player whose request caused them.
///
/// Internally tagged: `{ "type": "JoinRoom", "room_id": "4821" }`.
/// Game state snapshots are codec-encoded bytes and only the game that
/// produced them knows their shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    // -- Connection lifecycle --
    /// Client → Server. `name` is the self-reported display name;
    /// `player_id` is presented again by a client that already holds one.
    Handshake {
        version: u32,
        name: String,
        player_id: Option<PlayerId>,
    },

    /// Server → Client.
    HandshakeAck {
        connection_id: u64,
        player_id: PlayerId,
        server_time: u64,
    },

    /// Either direction.
    Disconnect { reason: String },

    Heartbeat { client_time: u64 },

    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- Requests --
    /// Create a room for `game`. `options` are the game's config encoded
    /// with the codec; empty means defaults.
    CreateRoom {
        game: String,
        room_id: Option<RoomId>,
        options: Vec<u8>,
    },

    JoinRoom { room_id: RoomId },

    /// Vote for a rematch.
    Rematch { room_id: RoomId },

    Surrender { room_id: RoomId },

    LeaveRoom { room_id: RoomId },

    /// Rebind a held seat to this connection.
    Reconnect { room_id: RoomId, player_id: PlayerId },

    /// Wait for a stranger in `bucket` (e.g. a difficulty level).
    JoinQueue { game: String, bucket: String },

    ListRooms,

    // -- Acknowledgements --
    /// Answer to create, join and reconnect.
    RoomJoined {
        room_id: RoomId,
        seat: Seat,
        state: Vec<u8>,
    },

    /// Answer to an accepted game move.
    MoveAccepted { room_id: RoomId, state: Vec<u8> },

    /// Answer to a request with nothing else to report.
    Ack,

    RoomList { rooms: Vec<RoomListEntry> },

    QueueJoined { bucket: String },

    /// Answer to a reconnect that arrived after the match concluded.
    MatchResult {
        room_id: RoomId,
        outcome: Outcome,
        reason: EndReason,
    },

    /// A failed request. Sent to the requester only.
    Error {
        kind: ErrorKind,
        code: u16,
        message: String,
    },

    // -- Broadcasts --
    /// All seats are filled and play begins.
    MatchStarted {
        room_id: RoomId,
        seats: Vec<SeatInfo>,
        state: Vec<u8>,
    },

    /// Authoritative state after a change.
    StateUpdate { room_id: RoomId, state: Vec<u8> },

    RematchRequested { room_id: RoomId, seat: Seat },

    MatchEnded {
        room_id: RoomId,
        outcome: Outcome,
        reason: EndReason,
    },

    /// A seat lost its connection. `reconnect_within_secs` is set when
    /// the seat is held for a reconnect countdown.
    PlayerDisconnected {
        room_id: RoomId,
        seat: Seat,
        reconnect_within_secs: Option<u64>,
    },

    PlayerRejoined { room_id: RoomId, seat: Seat },

    /// The matchmaking queue paired this player into a fresh room.
    Paired {
        room_id: RoomId,
        seat: Seat,
        seats: Vec<SeatInfo>,
        state: Vec<u8>,
    },

    /// Nobody else joined the bucket before the queue timeout.
    QueueTimeout { bucket: String },
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

/// Game data addressed to one room.
///
/// Client → server it carries a codec-encoded game move; server → client
/// a codec-encoded game event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFrame {
    pub room_id: RoomId,
    pub data: Vec<u8>,
}

/// The content of an envelope.
///
/// Adjacently tagged: `{ "type": "System", "data": { ... } }` or
/// `{ "type": "Game", "data": { "room_id": "...", "data": [...] } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Game(GameFrame),
}

/// The top-level wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number.
    pub seq: u64,

    /// For acknowledgements: the `seq` of the request being answered.
    /// Absent on requests and broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    #[serde(default)]
    pub channel: Channel,

    pub payload: Payload,
}

impl Envelope {
    /// Builds a reliable envelope with no ack reference.
    pub fn new(seq: u64, timestamp: u64, payload: Payload) -> Self {
        Self {
            seq,
            ack: None,
            timestamp,
            channel: Channel::ReliableOrdered,
            payload,
        }
    }

    /// Marks this envelope as the answer to request `seq`.
    pub fn answering(mut self, seq: u64) -> Self {
        self.ack = Some(seq);
        self
    }
}
