//! # Tabletop
//!
//! A server for turn-based multiplayer board games played in the browser.
//!
//! The server is authoritative: clients send requests and moves, the
//! server validates them against the game's rules, commits them, and
//! pushes the result to every seat in the room. Games plug in through
//! [`GameLogic`]; the bundled ones live in `tabletop-games`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tabletop::prelude::*;
//!
//! # async fn run() -> Result<(), TabletopError> {
//! let server = TabletopServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .register::<Checkers>()
//!     .register::<Hanoi>()
//!     .register::<SnakesAndLadders>()
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
pub mod logging;
mod server;

pub use error::TabletopError;
pub use server::{
    HANDSHAKE_TIMEOUT, IDLE_TIMEOUT, PROTOCOL_VERSION, ServerConfig, TabletopServer,
    TabletopServerBuilder,
};

pub mod prelude {
    pub use crate::{TabletopError, TabletopServer, TabletopServerBuilder};
    pub use tabletop_games::{Checkers, Hanoi, SnakesAndLadders};
    pub use tabletop_protocol::{
        Codec, EndReason, Envelope, ErrorKind, GameFrame, JsonCodec, Outcome, Payload, PlayerId,
        Recipient, RoomId, Seat, SystemMessage,
    };
    pub use tabletop_room::{
        Applied, DisconnectPolicy, GameLogic, MatchmakingConfig, RoomConfig, RoomError,
        RoomIdPolicy, TurnOrder, TurnOutcome,
    };
    pub use tabletop_session::{SessionConfig, SessionError};
}
