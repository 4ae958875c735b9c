//! Checkers on an 8×8 or 10×10 board with mandatory captures.
//!
//! The server never trusts a submitted move: it recomputes the legal moves
//! for the claimed origin and accepts the submission only if one of them
//! lands on the same cell and takes the same pieces.

pub mod engine;

use serde::{Deserialize, Serialize};
use tabletop_protocol::{Outcome, Recipient, Seat};
use tabletop_room::{Applied, DisconnectPolicy, GameLogic, RoomConfig, TurnOutcome};

use engine::{Board, Cell, PieceMove, opponent};

/// A draw is declared once this many consecutive half-moves pass without
/// a capture.
pub const QUIET_MOVE_LIMIT: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceColor {
    #[default]
    Red,
    Black,
}

impl PieceColor {
    pub fn other(self) -> Self {
        match self {
            Self::Red => Self::Black,
            Self::Black => Self::Red,
        }
    }
}

/// Room options. The creator plays `color`; the second seat gets the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckersConfig {
    pub size: usize,
    pub color: PieceColor,
}

impl Default for CheckersConfig {
    fn default() -> Self {
        Self {
            size: 8,
            color: PieceColor::Red,
        }
    }
}

/// One accepted move in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub seat: Seat,
    pub from: Cell,
    pub to: Cell,
    pub captured: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckersState {
    pub size: usize,
    pub board: Board,
    pub current_player: Seat,
    /// Piece color per seat.
    pub colors: [PieceColor; 2],
    pub remaining: [usize; 2],
    pub has_king: [bool; 2],
    pub history: Vec<HistoryEntry>,
    pub result: Option<Outcome>,
}

impl CheckersState {
    pub fn new(size: usize, colors: [PieceColor; 2]) -> Self {
        let board = Board::standard(size);
        let remaining = [board.count(Seat(0)), board.count(Seat(1))];
        Self {
            size,
            board,
            current_player: Seat(0),
            colors,
            remaining,
            has_king: [false; 2],
            history: Vec::new(),
            result: None,
        }
    }

    /// Legal moves for the piece on `from` with `seat` to move.
    pub fn legal_moves(&self, from: Cell, seat: Seat) -> Vec<PieceMove> {
        if !self.board.contains(from) {
            return Vec::new();
        }
        engine::legal_moves(&self.board, from, seat)
    }

    fn quiet_streak_reached(&self) -> bool {
        self.history.len() >= QUIET_MOVE_LIMIT
            && self.history[self.history.len() - QUIET_MOVE_LIMIT..]
                .iter()
                .all(|entry| entry.captured == 0)
    }

    /// Terminal check with `next` about to move.
    fn judge(&self, next: Seat) -> Option<Outcome> {
        if self.remaining[0] == 0 {
            return Some(Outcome::Winner(Seat(1)));
        }
        if self.remaining[1] == 0 {
            return Some(Outcome::Winner(Seat(0)));
        }
        if !engine::has_any_move(&self.board, next) {
            return Some(Outcome::Winner(opponent(next)));
        }
        if self.quiet_streak_reached() {
            return Some(Outcome::Draw);
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckersMove {
    /// Move a piece. `captured` lists the jumped cells of a capture chain.
    Move {
        from: Cell,
        to: Cell,
        #[serde(default)]
        captured: Vec<Cell>,
    },
    /// Ask which moves the piece on `from` has. Answered to the asking
    /// seat only.
    LegalMoves { from: Cell },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckersEvent {
    LegalMoves {
        from: Cell,
        moves: Vec<PieceMove>,
    },
    Moved {
        seat: Seat,
        from: Cell,
        to: Cell,
        captured: Vec<Cell>,
        promoted: bool,
    },
}

pub struct Checkers;

impl GameLogic for Checkers {
    const KIND: &'static str = "checkers";

    type Config = CheckersConfig;
    type State = CheckersState;
    type Move = CheckersMove;
    type Event = CheckersEvent;

    fn room_config(_config: &CheckersConfig) -> RoomConfig {
        RoomConfig {
            seats: 2,
            disconnect_policy: DisconnectPolicy::Forfeit,
            ..RoomConfig::default()
        }
    }

    fn validate_config(config: &CheckersConfig) -> Result<(), String> {
        match config.size {
            8 | 10 => Ok(()),
            other => Err(format!("board size must be 8 or 10, got {other}")),
        }
    }

    fn init(config: &CheckersConfig) -> CheckersState {
        CheckersState::new(config.size, [config.color, config.color.other()])
    }

    fn current_turn(state: &CheckersState) -> Seat {
        state.current_player
    }

    fn set_turn(state: &mut CheckersState, seat: Seat) {
        state.current_player = seat;
    }

    fn query(state: &CheckersState, seat: Seat, mv: &CheckersMove) -> Option<CheckersEvent> {
        match mv {
            CheckersMove::LegalMoves { from } => Some(CheckersEvent::LegalMoves {
                from: *from,
                moves: state.legal_moves(*from, seat),
            }),
            CheckersMove::Move { .. } => None,
        }
    }

    fn validate_move(state: &CheckersState, seat: Seat, mv: &CheckersMove) -> Result<(), String> {
        let CheckersMove::Move { from, to, captured } = mv else {
            return Ok(());
        };
        let claimed = PieceMove {
            from: *from,
            to: *to,
            captured: captured.clone(),
        };
        if state
            .legal_moves(*from, seat)
            .iter()
            .any(|legal| legal.same_result(&claimed))
        {
            Ok(())
        } else {
            Err("illegal or tampered move".into())
        }
    }

    fn apply_move(state: &mut CheckersState, seat: Seat, mv: CheckersMove) -> Applied<CheckersEvent> {
        let CheckersMove::Move { from, to, captured } = mv else {
            return Applied {
                turn: TurnOutcome::Hold,
                events: Vec::new(),
            };
        };
        let mv = PieceMove { from, to, captured };

        let promoted = state.board.apply(&mv);
        let other = opponent(seat);
        state.remaining[other.index()] = state.board.count(other);
        if promoted {
            state.has_king[seat.index()] = true;
        }
        state.history.push(HistoryEntry {
            seat,
            from: mv.from,
            to: mv.to,
            captured: mv.captured.len(),
        });

        let extra = mv.is_capture()
            && !promoted
            && !engine::capture_chains(&state.board, mv.to).is_empty();
        let next = if extra { seat } else { other };
        state.result = state.judge(next);

        let turn = if extra {
            TurnOutcome::ExtraTurn
        } else {
            TurnOutcome::Pass
        };
        Applied {
            turn,
            events: Vec::new(),
        }
        .with_event(
            Recipient::All,
            CheckersEvent::Moved {
                seat,
                from: mv.from,
                to: mv.to,
                captured: mv.captured,
                promoted,
            },
        )
    }

    fn outcome(state: &CheckersState) -> Option<Outcome> {
        state.result
    }

    fn forfeit(state: &mut CheckersState, outcome: Outcome) {
        state.result = Some(outcome);
    }

    /// Fresh board with the seats' colors swapped.
    fn rematch(previous: &CheckersState, _config: &CheckersConfig) -> CheckersState {
        CheckersState::new(previous.size, [previous.colors[1], previous.colors[0]])
    }
}
