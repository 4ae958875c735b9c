//! Snakes & Ladders for two to four players.
//!
//! Every token starts on square 1. A roll that would pass 100 bounces back
//! by the excess. Landing on a snake's head or a ladder's foot moves the
//! token to the other end, and landing on an opponent's square sends that
//! opponent back to 1. Rolling a six, capturing, or reaching 100 earns
//! another roll.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tabletop_protocol::{Outcome, Recipient, Seat};
use tabletop_room::{Applied, DisconnectPolicy, GameLogic, RoomConfig, TurnOutcome};

pub const START: u8 = 1;
pub const FINISH: u8 = 100;
pub const DIE_FACES: u8 = 6;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

/// `(head, tail)` of every snake.
pub const SNAKES: [(u8, u8); 10] = [
    (16, 6),
    (47, 26),
    (49, 11),
    (56, 53),
    (62, 19),
    (64, 60),
    (87, 24),
    (93, 73),
    (95, 75),
    (98, 78),
];

/// `(foot, top)` of every ladder.
pub const LADDERS: [(u8, u8); 9] = [
    (1, 38),
    (4, 14),
    (9, 31),
    (21, 42),
    (28, 84),
    (36, 44),
    (51, 67),
    (71, 91),
    (80, 100),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpKind {
    Snake,
    Ladder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jump {
    pub kind: JumpKind,
    pub from: u8,
    pub to: u8,
}

/// The snake or ladder starting on `square`, if any.
pub fn jump_at(square: u8) -> Option<Jump> {
    let snake = SNAKES.iter().find(|(head, _)| *head == square).map(|&(from, to)| Jump {
        kind: JumpKind::Snake,
        from,
        to,
    });
    snake.or_else(|| {
        LADDERS.iter().find(|(foot, _)| *foot == square).map(|&(from, to)| Jump {
            kind: JumpKind::Ladder,
            from,
            to,
        })
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnakesConfig {
    pub players: usize,
}

impl Default for SnakesConfig {
    fn default() -> Self {
        Self {
            players: MIN_PLAYERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnakesState {
    /// Square of each seat's token.
    pub positions: Vec<u8>,
    pub current_turn: Seat,
    pub last_roll: Option<u8>,
    pub result: Option<Outcome>,
}

impl SnakesState {
    pub fn new(players: usize) -> Self {
        Self {
            positions: vec![START; players],
            current_turn: Seat(0),
            last_roll: None,
            result: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnakesMove {
    Roll,
}

/// What one roll did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollReport {
    pub seat: Seat,
    pub value: u8,
    pub from: u8,
    pub to: u8,
    pub bounced: bool,
    pub jump: Option<Jump>,
    /// Seats sent back to the start.
    pub captured: Vec<Seat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnakesEvent {
    Rolled(RollReport),
}

/// Moves `seat`'s token by `value` and resolves bounces, jumps, captures
/// and a win. Returns the report and whether the seat rolls again.
pub fn apply_roll(state: &mut SnakesState, seat: Seat, value: u8) -> (RollReport, TurnOutcome) {
    let from = state.positions.get(seat.index()).copied().unwrap_or(START);
    let mut to = from + value;
    let bounced = to > FINISH;
    if bounced {
        to = FINISH - (to - FINISH);
    }
    let jump = jump_at(to);
    if let Some(jump) = jump {
        to = jump.to;
    }

    let mut captured = Vec::new();
    for (index, position) in state.positions.iter_mut().enumerate() {
        if index != seat.index() && *position == to {
            *position = START;
            captured.push(Seat(index as u8));
        }
    }
    if let Some(position) = state.positions.get_mut(seat.index()) {
        *position = to;
    }
    state.last_roll = Some(value);
    if to == FINISH {
        state.result = Some(Outcome::Winner(seat));
    }

    let again = value == DIE_FACES || !captured.is_empty() || to == FINISH;
    let turn = if again {
        TurnOutcome::ExtraTurn
    } else {
        TurnOutcome::Pass
    };
    let report = RollReport {
        seat,
        value,
        from,
        to,
        bounced,
        jump,
        captured,
    };
    (report, turn)
}

pub struct SnakesAndLadders;

impl GameLogic for SnakesAndLadders {
    const KIND: &'static str = "snakes_and_ladders";

    type Config = SnakesConfig;
    type State = SnakesState;
    type Move = SnakesMove;
    type Event = SnakesEvent;

    fn room_config(config: &SnakesConfig) -> RoomConfig {
        RoomConfig {
            seats: config.players,
            disconnect_policy: DisconnectPolicy::Forfeit,
            ..RoomConfig::default()
        }
    }

    fn validate_config(config: &SnakesConfig) -> Result<(), String> {
        if (MIN_PLAYERS..=MAX_PLAYERS).contains(&config.players) {
            Ok(())
        } else {
            Err(format!(
                "players must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
            ))
        }
    }

    fn init(config: &SnakesConfig) -> SnakesState {
        SnakesState::new(config.players)
    }

    fn current_turn(state: &SnakesState) -> Seat {
        state.current_turn
    }

    fn set_turn(state: &mut SnakesState, seat: Seat) {
        state.current_turn = seat;
    }

    fn validate_move(state: &SnakesState, seat: Seat, _mv: &SnakesMove) -> Result<(), String> {
        if seat.index() >= state.positions.len() {
            return Err(format!("{seat} has no token"));
        }
        Ok(())
    }

    fn apply_move(state: &mut SnakesState, seat: Seat, _mv: SnakesMove) -> Applied<SnakesEvent> {
        let value = rand::rng().random_range(1..=DIE_FACES);
        let (report, turn) = apply_roll(state, seat, value);
        tracing::trace!(%seat, value, to = report.to, "dice rolled");
        Applied {
            turn,
            events: vec![(Recipient::All, SnakesEvent::Rolled(report))],
        }
    }

    fn outcome(state: &SnakesState) -> Option<Outcome> {
        state.result
    }

    fn forfeit(state: &mut SnakesState, outcome: Outcome) {
        state.result = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_at_table() {
        assert_eq!(
            jump_at(16),
            Some(Jump {
                kind: JumpKind::Snake,
                from: 16,
                to: 6
            })
        );
        assert_eq!(jump_at(28).map(|j| j.to), Some(84));
        assert_eq!(jump_at(50), None);
    }

    #[test]
    fn test_apply_roll_plain_move_passes() {
        let mut state = SnakesState::new(2);
        let (report, turn) = apply_roll(&mut state, Seat(0), 2);

        assert_eq!(report.to, 3);
        assert_eq!(state.positions, vec![3, 1]);
        assert_eq!(turn, TurnOutcome::Pass);
        assert_eq!(state.last_roll, Some(2));
    }

    #[test]
    fn test_apply_roll_ladder_and_snake() {
        let mut state = SnakesState::new(2);
        let (report, _) = apply_roll(&mut state, Seat(0), 3);
        assert_eq!(report.to, 14);
        assert_eq!(report.jump.map(|j| j.kind), Some(JumpKind::Ladder));

        state.positions[1] = 12;
        let (report, _) = apply_roll(&mut state, Seat(1), 4);
        assert_eq!(report.to, 6);
        assert_eq!(report.jump.map(|j| j.kind), Some(JumpKind::Snake));
    }

    #[test]
    fn test_apply_roll_six_rolls_again() {
        let mut state = SnakesState::new(2);
        let (_, turn) = apply_roll(&mut state, Seat(0), 6);
        assert_eq!(state.positions[0], 7);
        assert_eq!(turn, TurnOutcome::ExtraTurn);
    }

    #[test]
    fn test_apply_roll_overshoot_bounces_back() {
        let mut state = SnakesState::new(2);
        state.positions[0] = 97;
        let (report, _) = apply_roll(&mut state, Seat(0), 5);

        // 102 bounces to 98, which is a snake head.
        assert!(report.bounced);
        assert_eq!(report.to, 78);
        assert_eq!(state.result, None);
    }

    #[test]
    fn test_apply_roll_landing_on_opponent_captures() {
        let mut state = SnakesState::new(3);
        state.positions = vec![10, 13, 1];
        let (report, turn) = apply_roll(&mut state, Seat(0), 3);

        assert_eq!(report.captured, vec![Seat(1)]);
        assert_eq!(state.positions, vec![13, 1, 1]);
        assert_eq!(turn, TurnOutcome::ExtraTurn);
    }

    #[test]
    fn test_apply_roll_reaching_finish_wins() {
        let mut state = SnakesState::new(2);
        state.positions[1] = 97;
        let (_, turn) = apply_roll(&mut state, Seat(1), 3);

        assert_eq!(state.positions[1], FINISH);
        assert_eq!(SnakesAndLadders::outcome(&state), Some(Outcome::Winner(Seat(1))));
        assert_eq!(turn, TurnOutcome::ExtraTurn);
    }

    #[test]
    fn test_apply_roll_ladder_to_finish_wins() {
        let mut state = SnakesState::new(2);
        state.positions[0] = 77;
        apply_roll(&mut state, Seat(0), 3);
        assert_eq!(SnakesAndLadders::outcome(&state), Some(Outcome::Winner(Seat(0))));
    }

    #[test]
    fn test_validate_config_player_range() {
        assert!(SnakesAndLadders::validate_config(&SnakesConfig { players: 1 }).is_err());
        assert!(SnakesAndLadders::validate_config(&SnakesConfig { players: 4 }).is_ok());
        assert!(SnakesAndLadders::validate_config(&SnakesConfig { players: 5 }).is_err());
    }

    #[test]
    fn test_apply_move_roll_emits_event() {
        let mut state = SnakesState::new(2);
        let applied = SnakesAndLadders::apply_move(&mut state, Seat(0), SnakesMove::Roll);

        let [(Recipient::All, SnakesEvent::Rolled(report))] = applied.events.as_slice() else {
            panic!("expected one roll event");
        };
        assert!((1..=DIE_FACES).contains(&report.value));
        assert_eq!(state.last_roll, Some(report.value));
    }
}
