//! The games bundled with Tabletop.
//!
//! - [`Checkers`]: 8×8 or 10×10, mandatory captures, server-side replay
//!   check of every submitted move
//! - [`Hanoi`]: two players sharing one set of towers, with undo and
//!   matchmaking buckets
//! - [`SnakesAndLadders`]: two to four players, server-rolled dice

pub mod checkers;
pub mod hanoi;
pub mod snakes;

pub use checkers::Checkers;
pub use hanoi::Hanoi;
pub use snakes::SnakesAndLadders;

use tabletop_protocol::Codec;
use tabletop_room::GameCatalog;

/// Registers every bundled game with `catalog`.
pub fn register_all<C: Codec + Clone>(catalog: &mut GameCatalog<C>) -> &mut GameCatalog<C> {
    catalog
        .register::<Checkers>()
        .register::<Hanoi>()
        .register::<SnakesAndLadders>()
}
