//! Rooms, turns and matchmaking for Tabletop.
//!
//! Each room runs as an isolated Tokio task (actor model) owning one
//! match: its seats, its game state and its timers. Games plug in through
//! the [`GameLogic`] trait; everything else here is game-agnostic.
//!
//! # Key types
//!
//! - [`GameLogic`]: the rules a room runs
//! - [`GameCatalog`]: the game kinds a server hosts
//! - [`RoomManager`]: creates rooms, finds them, routes requests
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Matchmaker`]: FIFO pairing per game and bucket
//! - [`next_turn`]: the turn arbiter

mod catalog;
mod config;
mod error;
mod logic;
mod manager;
mod matchmaking;
mod results;
mod room;
mod store;
mod turn;

pub use catalog::GameCatalog;
pub use config::{DEFAULT_GRACE, DisconnectPolicy, RoomConfig, RoomIdPolicy, RoomStatus};
pub use error::RoomError;
pub use logic::{Applied, GameLogic};
pub use manager::RoomManager;
pub use matchmaking::{Matchmaker, MatchmakingConfig, QueueOutcome};
pub use results::{DEFAULT_RESULT_RETENTION, MatchRecord, ResultCache};
pub use room::{
    DisconnectOutcome, JoinAck, PlayerSender, Rejoin, RoomHandle, RoomInfo, RoomOutbound,
    SeatRequest,
};
pub use turn::{NextTurn, TurnOrder, TurnOutcome, next_turn, seat_after};
