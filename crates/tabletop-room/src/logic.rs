//! The `GameLogic` trait: the strategy a room runs.
//!
//! A game plugs its rules in here and nothing else. Rooms, seats, turns,
//! timers and wire framing stay in the room layer; a game only sees its
//! own state and the seat that acted.

use serde::{Serialize, de::DeserializeOwned};
use tabletop_protocol::{Outcome, Recipient, Seat};

use crate::{RoomConfig, RoomIdPolicy, TurnOrder, TurnOutcome};

/// The result of applying one accepted move.
#[derive(Debug, Clone)]
pub struct Applied<E> {
    /// What the game says about turn order. The room's turn arbiter turns
    /// this into the next turn holder.
    pub turn: TurnOutcome,

    /// Game events to deliver, each addressed to part of the table.
    pub events: Vec<(Recipient, E)>,
}

impl<E> Applied<E> {
    /// A move with no events that hands the turn on.
    pub fn pass() -> Self {
        Self {
            turn: TurnOutcome::Pass,
            events: Vec::new(),
        }
    }

    /// A move with no events after which the mover goes again.
    pub fn extra_turn() -> Self {
        Self {
            turn: TurnOutcome::ExtraTurn,
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, recipient: Recipient, event: E) -> Self {
        self.events.push((recipient, event));
        self
    }
}

/// Rules for one kind of game.
///
/// All functions are associated (no `self`): a room holds the game's
/// `State` and calls these with it. `apply_move` runs on a scratch copy of
/// the state; if it panics the copy is thrown away and the room keeps the
/// state it had.
pub trait GameLogic: Send + Sync + 'static {
    /// Name clients use to pick this game (`"checkers"`).
    const KIND: &'static str;

    /// How rooms for this game are named when the creator picks no id.
    const ROOM_IDS: RoomIdPolicy = RoomIdPolicy::Opaque;

    /// Creation options. An empty options buffer means `Default`.
    type Config: Send + Sync + Clone + Default + DeserializeOwned + 'static;

    /// The full game state, sent to clients as a snapshot.
    type State: Send + Sync + Clone + Serialize + 'static;

    /// What a seat submits.
    type Move: Send + Sync + DeserializeOwned + 'static;

    /// Events beyond the state snapshot (a legal-move listing, a die roll).
    type Event: Send + Sync + Clone + Serialize + 'static;

    /// Seats, disconnect policy and grace periods for a room built from
    /// `config`.
    fn room_config(config: &Self::Config) -> RoomConfig;

    /// Rejects out-of-range options before a room is created.
    fn validate_config(_config: &Self::Config) -> Result<(), String> {
        Ok(())
    }

    /// Options for a matchmaking bucket, or `None` if the game has no such
    /// bucket.
    fn bucket_config(_bucket: &str) -> Option<Self::Config> {
        None
    }

    /// Builds the starting position. Called when the room is created and
    /// again when the last seat fills.
    fn init(config: &Self::Config) -> Self::State;

    fn turn_order() -> TurnOrder {
        TurnOrder::Alternating
    }

    fn current_turn(state: &Self::State) -> Seat;

    /// Writes the turn arbiter's verdict back into the state.
    fn set_turn(state: &mut Self::State, seat: Seat);

    /// `false` for moves a seat may make out of turn (an undo request).
    fn requires_turn(_mv: &Self::Move) -> bool {
        true
    }

    /// Read-only requests ride the move channel. Returning `Some` answers
    /// the request with an event for the asking seat and skips the rest
    /// of the move pipeline.
    fn query(_state: &Self::State, _seat: Seat, _mv: &Self::Move) -> Option<Self::Event> {
        None
    }

    /// Checks a move against the rules without changing anything.
    fn validate_move(state: &Self::State, seat: Seat, mv: &Self::Move) -> Result<(), String>;

    /// Applies a move that passed validation.
    fn apply_move(state: &mut Self::State, seat: Seat, mv: Self::Move) -> Applied<Self::Event>;

    /// The match result, once the position is terminal.
    fn outcome(state: &Self::State) -> Option<Outcome>;

    /// Records a result that did not come from play (surrender, departure,
    /// expired reconnect) so the snapshot shows it.
    fn forfeit(state: &mut Self::State, outcome: Outcome);

    /// Starting position for a rematch. Defaults to a fresh `init`.
    fn rematch(_previous: &Self::State, config: &Self::Config) -> Self::State {
        Self::init(config)
    }
}
