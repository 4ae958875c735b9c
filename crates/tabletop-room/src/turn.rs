//! The Turn Arbiter: who acts after an accepted move.
//!
//! Pure and total. Given the seat that just moved, the seats still in
//! play, the game's turn order and what the game said about the move, it
//! returns exactly one answer and touches nothing. The room writes the
//! answer back into the game state.

use tabletop_protocol::Seat;

/// How a game sequences its seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnOrder {
    /// One seat at a time, rotating.
    #[default]
    Alternating,
    /// Every seat may move at any time; the turn marker is advisory.
    Simultaneous,
}

/// What the game reports about turn order after applying a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Hand the turn to the next seat.
    Pass,
    /// The mover keeps the turn: a capture chain continues, a six was
    /// rolled, a piece reached home.
    ExtraTurn,
    /// The game set the turn itself (e.g. an undo restored it).
    Hold,
}

/// The arbiter's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTurn {
    Seat(Seat),
    Unchanged,
}

/// Decides the next turn holder.
///
/// `in_play` lists the seats still taking turns (surrendered or departed
/// seats are skipped). With `Pass`, the turn goes to the first in-play
/// seat after `current`, wrapping around.
pub fn next_turn(
    current: Seat,
    in_play: &[Seat],
    order: TurnOrder,
    outcome: TurnOutcome,
) -> NextTurn {
    if order == TurnOrder::Simultaneous {
        return NextTurn::Unchanged;
    }
    match outcome {
        TurnOutcome::Hold => NextTurn::Unchanged,
        TurnOutcome::ExtraTurn if in_play.contains(&current) => NextTurn::Seat(current),
        TurnOutcome::ExtraTurn | TurnOutcome::Pass => match seat_after(current, in_play) {
            Some(seat) => NextTurn::Seat(seat),
            None => NextTurn::Unchanged,
        },
    }
}

/// First seat in `in_play` strictly after `current`, wrapping around.
/// Returns `None` only when `in_play` is empty.
pub fn seat_after(current: Seat, in_play: &[Seat]) -> Option<Seat> {
    let later = in_play.iter().copied().filter(|s| *s > current).min();
    later.or_else(|| in_play.iter().copied().min())
}
