//! Room configuration and lifecycle status.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long an empty room (or a seat whose connection dropped) is kept
/// before being torn down.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Per-room settings, derived from the game's config by
/// [`GameLogic::room_config`](crate::GameLogic::room_config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Seats at the table. The room starts playing once all are filled.
    pub seats: usize,

    /// What happens to a seat whose connection drops mid-match.
    pub disconnect_policy: DisconnectPolicy,

    /// How long a room with no connected players survives before it is
    /// deleted. A join or reconnect inside the window rescues it.
    pub empty_room_grace: Duration,

    /// Countdown for a held seat under [`DisconnectPolicy::AwaitReconnect`].
    pub reconnect_grace: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            seats: 2,
            disconnect_policy: DisconnectPolicy::Forfeit,
            empty_room_grace: DEFAULT_GRACE,
            reconnect_grace: DEFAULT_GRACE,
        }
    }
}

/// Disconnect handling differs per game; each game picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectPolicy {
    /// The seat is released at once. If a match is underway and only one
    /// seat is left in play, that seat wins immediately.
    Forfeit,

    /// The seat is held with no connection while a countdown runs; only
    /// if it expires does the disconnected seat forfeit.
    AwaitReconnect,
}

/// How a game's rooms are named when the creator does not pick an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomIdPolicy {
    /// A UUID v4 string.
    Opaque,
    /// A four-digit numeric code players can read out to each other.
    ShortCode,
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a room.
///
/// ```text
/// Waiting ──(all seats filled)──→ Playing ──(terminal / forfeit)──→ Finished
///                                    ↑                                  │
///                                    └───────────(rematch)──────────────┘
/// ```
///
/// Occupancy is tracked separately: a room in any status may have zero
/// connected players while its deletion grace period runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if new players may take a seat.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while the match has not concluded.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Waiting | Self::Playing)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    ///
    /// `Playing → Playing` and `Finished → Playing` are rematches.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Playing)
                | (Self::Playing, Self::Finished)
                | (Self::Playing, Self::Playing)
                | (Self::Finished, Self::Playing)
        )
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}
