//! Shared fixtures: a counter game and helpers for seating players.

#![allow(dead_code)]

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tabletop_protocol::{JsonCodec, Outcome, PlayerId, Recipient, Seat, SystemMessage};
use tabletop_room::{
    Applied, DisconnectPolicy, GameCatalog, GameLogic, RoomConfig, RoomIdPolicy, RoomManager,
    RoomOutbound, SeatRequest, TurnOrder, TurnOutcome,
};
use tabletop_transport::ConnectionId;
use tokio::sync::mpsc;

// =========================================================================
// Mock game: seats take turns adding to a counter until it hits a target.
// =========================================================================

pub struct CounterGame;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub target: u32,
    pub seats: usize,
    pub hold_seats: bool,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            target: 5,
            seats: 2,
            hold_seats: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterState {
    pub count: u32,
    pub target: u32,
    pub turn: Seat,
    pub last: Option<Seat>,
    pub result: Option<Outcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CounterMove {
    Add(u32),
    /// Panics inside the rules after scribbling on the state.
    Boom,
    /// Read-only: answers with the current count.
    Peek,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CounterEvent {
    Counted(u32),
    Peeked(u32),
}

impl GameLogic for CounterGame {
    const KIND: &'static str = "counter";

    type Config = CounterConfig;
    type State = CounterState;
    type Move = CounterMove;
    type Event = CounterEvent;

    fn room_config(config: &CounterConfig) -> RoomConfig {
        RoomConfig {
            seats: config.seats,
            disconnect_policy: if config.hold_seats {
                DisconnectPolicy::AwaitReconnect
            } else {
                DisconnectPolicy::Forfeit
            },
            ..RoomConfig::default()
        }
    }

    fn validate_config(config: &CounterConfig) -> Result<(), String> {
        if config.target == 0 {
            return Err("target must be positive".into());
        }
        if !(1..=4).contains(&config.seats) {
            return Err("1 to 4 seats".into());
        }
        Ok(())
    }

    fn bucket_config(bucket: &str) -> Option<CounterConfig> {
        (bucket == "quick").then(|| CounterConfig {
            target: 3,
            ..CounterConfig::default()
        })
    }

    fn init(config: &CounterConfig) -> CounterState {
        CounterState {
            count: 0,
            target: config.target,
            turn: Seat(0),
            last: None,
            result: None,
        }
    }

    fn current_turn(state: &CounterState) -> Seat {
        state.turn
    }

    fn set_turn(state: &mut CounterState, seat: Seat) {
        state.turn = seat;
    }

    fn query(state: &CounterState, _seat: Seat, mv: &CounterMove) -> Option<CounterEvent> {
        match mv {
            CounterMove::Peek => Some(CounterEvent::Peeked(state.count)),
            _ => None,
        }
    }

    fn validate_move(_state: &CounterState, _seat: Seat, mv: &CounterMove) -> Result<(), String> {
        match mv {
            CounterMove::Add(0) => Err("must add at least one".into()),
            _ => Ok(()),
        }
    }

    fn apply_move(state: &mut CounterState, seat: Seat, mv: CounterMove) -> Applied<CounterEvent> {
        match mv {
            CounterMove::Add(n) => {
                state.count += n;
                state.last = Some(seat);
                Applied::pass().with_event(Recipient::All, CounterEvent::Counted(state.count))
            }
            CounterMove::Boom => {
                state.count += 1000;
                panic!("counter exploded");
            }
            CounterMove::Peek => Applied {
                turn: TurnOutcome::Hold,
                events: Vec::new(),
            },
        }
    }

    fn outcome(state: &CounterState) -> Option<Outcome> {
        state.result.or_else(|| {
            (state.count >= state.target)
                .then(|| Outcome::Winner(state.last.unwrap_or(Seat(0))))
        })
    }

    fn forfeit(state: &mut CounterState, outcome: Outcome) {
        state.result = Some(outcome);
    }
}

/// The same counter, hosted under four-digit room codes.
pub struct CodedCounter;

impl GameLogic for CodedCounter {
    const KIND: &'static str = "coded-counter";
    const ROOM_IDS: RoomIdPolicy = RoomIdPolicy::ShortCode;

    type Config = CounterConfig;
    type State = CounterState;
    type Move = CounterMove;
    type Event = CounterEvent;

    fn room_config(config: &CounterConfig) -> RoomConfig {
        CounterGame::room_config(config)
    }

    fn init(config: &CounterConfig) -> CounterState {
        CounterGame::init(config)
    }

    fn current_turn(state: &CounterState) -> Seat {
        state.turn
    }

    fn set_turn(state: &mut CounterState, seat: Seat) {
        state.turn = seat;
    }

    fn validate_move(state: &CounterState, seat: Seat, mv: &CounterMove) -> Result<(), String> {
        CounterGame::validate_move(state, seat, mv)
    }

    fn apply_move(state: &mut CounterState, seat: Seat, mv: CounterMove) -> Applied<CounterEvent> {
        CounterGame::apply_move(state, seat, mv)
    }

    fn outcome(state: &CounterState) -> Option<Outcome> {
        CounterGame::outcome(state)
    }

    fn forfeit(state: &mut CounterState, outcome: Outcome) {
        state.result = Some(outcome);
    }
}

/// The same counter with every seat free to add at any time.
pub struct FreeForAllCounter;

impl GameLogic for FreeForAllCounter {
    const KIND: &'static str = "free-counter";

    type Config = CounterConfig;
    type State = CounterState;
    type Move = CounterMove;
    type Event = CounterEvent;

    fn room_config(config: &CounterConfig) -> RoomConfig {
        CounterGame::room_config(config)
    }

    fn init(config: &CounterConfig) -> CounterState {
        CounterGame::init(config)
    }

    fn turn_order() -> TurnOrder {
        TurnOrder::Simultaneous
    }

    fn current_turn(state: &CounterState) -> Seat {
        state.turn
    }

    fn set_turn(state: &mut CounterState, seat: Seat) {
        state.turn = seat;
    }

    fn validate_move(state: &CounterState, seat: Seat, mv: &CounterMove) -> Result<(), String> {
        CounterGame::validate_move(state, seat, mv)
    }

    fn apply_move(state: &mut CounterState, seat: Seat, mv: CounterMove) -> Applied<CounterEvent> {
        CounterGame::apply_move(state, seat, mv)
    }

    fn outcome(state: &CounterState) -> Option<Outcome> {
        CounterGame::outcome(state)
    }

    fn forfeit(state: &mut CounterState, outcome: Outcome) {
        state.result = Some(outcome);
    }
}

// =========================================================================
// Helpers
// =========================================================================

pub fn manager() -> RoomManager<JsonCodec> {
    let mut catalog = GameCatalog::new();
    catalog
        .register::<CounterGame>()
        .register::<CodedCounter>()
        .register::<FreeForAllCounter>();
    RoomManager::new(catalog, JsonCodec)
}

pub fn pid(id: &str) -> PlayerId {
    PlayerId::new(id)
}

/// A seat request plus the receiving end of the player's outbound channel.
pub fn player(id: &str, conn: u64) -> (SeatRequest, mpsc::UnboundedReceiver<RoomOutbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let request = SeatRequest {
        player_id: pid(id),
        name: id.to_string(),
        connection: ConnectionId::new(conn),
        sender: tx,
    };
    (request, rx)
}

pub fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

pub fn options(config: CounterConfig) -> Vec<u8> {
    encode(&config)
}

/// Everything delivered to a player so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<RoomOutbound>) -> Vec<RoomOutbound> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Only the room notices among `msgs`.
pub fn notices(msgs: &[RoomOutbound]) -> Vec<SystemMessage> {
    msgs.iter()
        .filter_map(|m| match m {
            RoomOutbound::System(sys) => Some(sys.clone()),
            RoomOutbound::Game(_) => None,
        })
        .collect()
}

/// Only the decoded game events among `msgs`.
pub fn events(msgs: &[RoomOutbound]) -> Vec<CounterEvent> {
    msgs.iter()
        .filter_map(|m| match m {
            RoomOutbound::Game(frame) => Some(decode(&frame.data)),
            RoomOutbound::System(_) => None,
        })
        .collect()
}

/// Lets spawned timer tasks and room actors catch up.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
