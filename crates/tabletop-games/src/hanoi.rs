//! Tower of Hanoi for two players sharing one set of towers.
//!
//! Seats alternate moving the top disk of one tower onto another; a disk
//! never goes onto a smaller one. Whoever completes the last tower wins.
//! Either seat may undo the previous move at any time while the match is
//! running, which also hands the turn back to whoever made it.
//!
//! Rooms use short numeric codes and are reachable through matchmaking;
//! a dropped player keeps their seat for the reconnect grace period.

use serde::{Deserialize, Serialize};
use tabletop_protocol::{Outcome, Recipient, Seat};
use tabletop_room::{
    Applied, DisconnectPolicy, GameLogic, RoomConfig, RoomIdPolicy, TurnOutcome,
};

pub const MIN_DISKS: u8 = 3;
pub const MAX_DISKS: u8 = 10;
pub const TOWERS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HanoiConfig {
    pub disks: u8,
}

impl Default for HanoiConfig {
    fn default() -> Self {
        Self { disks: MIN_DISKS }
    }
}

/// Towers and turn as they were before a move, for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub towers: [Vec<u8>; TOWERS],
    pub moves: u32,
    pub current_player: Seat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HanoiState {
    /// Each tower lists its disks bottom to top; larger numbers are larger
    /// disks.
    pub towers: [Vec<u8>; TOWERS],
    pub disks: u8,
    pub moves: u32,
    pub current_player: Seat,
    pub history: Vec<Snapshot>,
    pub result: Option<Outcome>,
}

impl HanoiState {
    pub fn new(disks: u8) -> Self {
        Self {
            towers: [(1..=disks).rev().collect(), Vec::new(), Vec::new()],
            disks,
            moves: 0,
            current_player: Seat(0),
            history: Vec::new(),
            result: None,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.towers[TOWERS - 1].len() == usize::from(self.disks)
    }

    fn check_transfer(&self, from: usize, to: usize) -> Result<u8, String> {
        if from >= TOWERS || to >= TOWERS {
            return Err("invalid tower index".into());
        }
        if from == to {
            return Err("source and target tower are the same".into());
        }
        let disk = *self.towers[from]
            .last()
            .ok_or_else(|| "source tower is empty".to_string())?;
        if self.towers[to].last().is_some_and(|top| disk > *top) {
            return Err("cannot place a larger disk on a smaller one".into());
        }
        Ok(disk)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HanoiMove {
    Transfer { from: usize, to: usize },
    Undo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HanoiEvent {
    Transferred {
        seat: Seat,
        disk: u8,
        from: usize,
        to: usize,
    },
    Undone {
        seat: Seat,
    },
}

pub struct Hanoi;

impl GameLogic for Hanoi {
    const KIND: &'static str = "hanoi";
    const ROOM_IDS: RoomIdPolicy = RoomIdPolicy::ShortCode;

    type Config = HanoiConfig;
    type State = HanoiState;
    type Move = HanoiMove;
    type Event = HanoiEvent;

    fn room_config(_config: &HanoiConfig) -> RoomConfig {
        RoomConfig {
            seats: 2,
            disconnect_policy: DisconnectPolicy::AwaitReconnect,
            ..RoomConfig::default()
        }
    }

    fn validate_config(config: &HanoiConfig) -> Result<(), String> {
        if (MIN_DISKS..=MAX_DISKS).contains(&config.disks) {
            Ok(())
        } else {
            Err(format!(
                "number of disks must be between {MIN_DISKS} and {MAX_DISKS}"
            ))
        }
    }

    fn bucket_config(bucket: &str) -> Option<HanoiConfig> {
        let disks = match bucket {
            "easy" => 3,
            "medium" => 5,
            "hard" => 7,
            _ => return None,
        };
        Some(HanoiConfig { disks })
    }

    fn init(config: &HanoiConfig) -> HanoiState {
        HanoiState::new(config.disks)
    }

    fn current_turn(state: &HanoiState) -> Seat {
        state.current_player
    }

    fn set_turn(state: &mut HanoiState, seat: Seat) {
        state.current_player = seat;
    }

    fn requires_turn(mv: &HanoiMove) -> bool {
        !matches!(mv, HanoiMove::Undo)
    }

    fn validate_move(state: &HanoiState, _seat: Seat, mv: &HanoiMove) -> Result<(), String> {
        match mv {
            HanoiMove::Transfer { from, to } => state.check_transfer(*from, *to).map(|_| ()),
            HanoiMove::Undo if state.history.is_empty() => Err("no moves to undo".into()),
            HanoiMove::Undo => Ok(()),
        }
    }

    fn apply_move(state: &mut HanoiState, seat: Seat, mv: HanoiMove) -> Applied<HanoiEvent> {
        match mv {
            HanoiMove::Transfer { from, to } => {
                state.history.push(Snapshot {
                    towers: state.towers.clone(),
                    moves: state.moves,
                    current_player: state.current_player,
                });
                let disk = state.towers[from].pop().unwrap_or_default();
                state.towers[to].push(disk);
                state.moves += 1;
                if state.is_solved() {
                    state.result = Some(Outcome::Winner(seat));
                }
                Applied::pass().with_event(
                    Recipient::All,
                    HanoiEvent::Transferred {
                        seat,
                        disk,
                        from,
                        to,
                    },
                )
            }
            HanoiMove::Undo => {
                if let Some(previous) = state.history.pop() {
                    state.towers = previous.towers;
                    state.moves = previous.moves;
                    state.current_player = previous.current_player;
                    state.result = None;
                }
                Applied {
                    turn: TurnOutcome::Hold,
                    events: Vec::new(),
                }
                .with_event(Recipient::All, HanoiEvent::Undone { seat })
            }
        }
    }

    fn outcome(state: &HanoiState) -> Option<Outcome> {
        state.result
    }

    fn forfeit(state: &mut HanoiState, outcome: Outcome) {
        state.result = Some(outcome);
    }
}
