//! Room actor: an isolated Tokio task that owns one match.
//!
//! Every operation on a room is a command in the actor's channel, so
//! joins, moves, disconnects and timer expiries are applied one at a time
//! in arrival order. Nothing outside the actor touches the game state.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use tabletop_protocol::{
    Codec, EndReason, GameFrame, Outcome, PlayerId, Recipient, RoomId, Seat, SeatInfo,
    SystemMessage,
};
use tabletop_timer::{TimerSlot, TimerToken};
use tabletop_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::results::MatchRecord;
use crate::store::{SharedStore, StoreUpdate};
use crate::turn::{NextTurn, next_turn, seat_after};
use crate::{DisconnectPolicy, GameLogic, RoomConfig, RoomError, RoomStatus, TurnOrder};

/// Distinguishes actors that happen to reuse a room id.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A message from a room to one player's connection handler.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomOutbound {
    /// A room notice (match started, state update, match ended...).
    System(SystemMessage),
    /// An encoded game event.
    Game(GameFrame),
}

/// Channel sender for delivering outbound messages to a player.
pub type PlayerSender = mpsc::UnboundedSender<RoomOutbound>;

/// A player asking for a seat.
#[derive(Debug, Clone)]
pub struct SeatRequest {
    pub player_id: PlayerId,
    pub name: String,
    pub connection: ConnectionId,
    pub sender: PlayerSender,
}

/// Reply to a successful join or reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAck {
    pub room_id: RoomId,
    pub seat: Seat,
    /// Encoded game state at the moment of joining.
    pub state: Vec<u8>,
}

/// Reply to a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejoin {
    /// The seat was still held; the player is back in it.
    Seated(JoinAck),
    /// The match concluded while the player was away.
    Concluded(MatchRecord),
}

/// What a dropped connection did to the player's seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The seat was given up.
    Released,
    /// The seat is held while a reconnect countdown runs.
    Held,
    /// The connection no longer spoke for a seat in this room.
    Ignored,
}

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub game: &'static str,
    pub status: RoomStatus,
    /// Seats taken, connected or not.
    pub player_count: usize,
    pub connected_count: usize,
    pub max_players: usize,
    /// Set once the current match has concluded.
    pub result: Option<(Outcome, EndReason)>,
}

/// How the room announces the start of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum StartNotice {
    #[default]
    MatchStarted,
    /// Rooms created by the matchmaker tell each seat where it landed.
    Paired,
}

// ---------------------------------------------------------------------------
// Commands and handle
// ---------------------------------------------------------------------------

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

pub(crate) enum RoomCommand {
    Join {
        player: SeatRequest,
        reply: Reply<JoinAck>,
    },
    Move {
        player_id: PlayerId,
        data: Vec<u8>,
        reply: Reply<Vec<u8>>,
    },
    Rematch {
        player_id: PlayerId,
        reply: Reply<()>,
    },
    Surrender {
        player_id: PlayerId,
        reply: Reply<()>,
    },
    Leave {
        player_id: PlayerId,
        reply: Reply<()>,
    },
    Reconnect {
        player: SeatRequest,
        reply: Reply<Rejoin>,
    },
    Disconnect {
        player_id: PlayerId,
        connection: ConnectionId,
        reply: oneshot::Sender<DisconnectOutcome>,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    GraceExpired {
        token: TimerToken,
    },
    ForfeitExpired {
        seat: Seat,
        token: TimerToken,
    },
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone; the store keeps one per room. Every method fails with
/// [`RoomError::Unavailable`] once the actor has stopped.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    game: &'static str,
    instance: u64,
    sender: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Join { .. } => "Join",
            Self::Move { .. } => "Move",
            Self::Rematch { .. } => "Rematch",
            Self::Surrender { .. } => "Surrender",
            Self::Leave { .. } => "Leave",
            Self::Reconnect { .. } => "Reconnect",
            Self::Disconnect { .. } => "Disconnect",
            Self::Info { .. } => "Info",
            Self::GraceExpired { .. } => "GraceExpired",
            Self::ForfeitExpired { .. } => "ForfeitExpired",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// The game kind this room plays.
    pub fn game(&self) -> &'static str {
        self.game
    }

    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }

    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Seats a player. A player who already holds a seat is put back in it.
    pub async fn join(&self, player: SeatRequest) -> Result<JoinAck, RoomError> {
        self.request(|reply| RoomCommand::Join { player, reply })
            .await?
    }

    /// Submits an encoded move. Returns the encoded state after the move.
    pub async fn submit_move(
        &self,
        player_id: PlayerId,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, RoomError> {
        self.request(|reply| RoomCommand::Move {
            player_id,
            data,
            reply,
        })
        .await?
    }

    pub async fn rematch(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Rematch { player_id, reply })
            .await?
    }

    pub async fn surrender(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Surrender { player_id, reply })
            .await?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    pub async fn reconnect(&self, player: SeatRequest) -> Result<Rejoin, RoomError> {
        self.request(|reply| RoomCommand::Reconnect { player, reply })
            .await?
    }

    /// Reports that `connection` (which spoke for `player_id`) closed.
    pub async fn disconnect(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> Result<DisconnectOutcome, RoomError> {
        self.request(|reply| RoomCommand::Disconnect {
            player_id,
            connection,
            reply,
        })
        .await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    /// Stops the actor without touching the store.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct SeatEntry {
    seat: Seat,
    player_id: PlayerId,
    name: String,
    connection: Option<ConnectionId>,
    sender: Option<PlayerSender>,
    /// Still taking turns: false once surrendered.
    in_play: bool,
    forfeit: TimerSlot,
}

impl SeatEntry {
    fn info(&self) -> SeatInfo {
        SeatInfo {
            seat: self.seat,
            name: self.name.clone(),
            connected: self.connection.is_some(),
        }
    }

    fn send(&self, msg: RoomOutbound) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(msg);
        }
    }
}

/// The room actor. Runs inside a Tokio task.
struct RoomActor<G: GameLogic, C: Codec> {
    room_id: RoomId,
    instance: u64,
    config: RoomConfig,
    game_config: G::Config,
    status: RoomStatus,
    /// Sorted by seat.
    seats: Vec<SeatEntry>,
    state: G::State,
    result: Option<(Outcome, EndReason)>,
    rematch_votes: HashSet<Seat>,
    grace: TimerSlot,
    notice: StartNotice,
    codec: C,
    store: SharedStore,
    pending: Vec<StoreUpdate>,
    self_tx: mpsc::WeakSender<RoomCommand>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<G: GameLogic, C: Codec> RoomActor<G, C> {
    /// Runs the actor loop until the room is deleted or shut down.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, game = G::KIND, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            tracing::trace!(room_id = %self.room_id, command = ?cmd, "room command");
            match cmd {
                RoomCommand::Join { player, reply } => {
                    let result = self.handle_join(player);
                    self.flush().await;
                    let _ = reply.send(result);
                }
                RoomCommand::Move {
                    player_id,
                    data,
                    reply,
                } => {
                    let result = self.handle_move(&player_id, &data);
                    self.flush().await;
                    let _ = reply.send(result);
                }
                RoomCommand::Rematch { player_id, reply } => {
                    let result = self.handle_rematch(&player_id);
                    let _ = reply.send(result);
                }
                RoomCommand::Surrender { player_id, reply } => {
                    let result = self.handle_surrender(&player_id);
                    self.flush().await;
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { player_id, reply } => {
                    let result = self.handle_leave(&player_id);
                    if result.is_ok() && self.seats.is_empty() {
                        self.destroy("last player left").await;
                        let _ = reply.send(result);
                        break;
                    }
                    self.flush().await;
                    let _ = reply.send(result);
                }
                RoomCommand::Reconnect { player, reply } => {
                    let result = self.handle_reconnect(player);
                    self.flush().await;
                    let _ = reply.send(result);
                }
                RoomCommand::Disconnect {
                    player_id,
                    connection,
                    reply,
                } => {
                    let outcome = self.handle_disconnect(&player_id, connection);
                    self.flush().await;
                    let _ = reply.send(outcome);
                }
                RoomCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::GraceExpired { token } => {
                    if self.grace.take_if_current(token) && self.connected_count() == 0 {
                        if self.status == RoomStatus::Playing {
                            self.finish(Outcome::Draw, EndReason::TimeExpired);
                        }
                        self.destroy("empty room grace period expired").await;
                        break;
                    }
                }
                RoomCommand::ForfeitExpired { seat, token } => {
                    self.handle_forfeit_expired(seat, token);
                    self.flush().await;
                }
                RoomCommand::Shutdown => {
                    tracing::info!(room_id = %self.room_id, "room shutting down");
                    break;
                }
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    // -- command handlers ---------------------------------------------------

    fn handle_join(&mut self, player: SeatRequest) -> Result<JoinAck, RoomError> {
        let result = self.seat_player(player);
        if result.is_ok() {
            // A join inside the grace window rescues an empty room.
            self.grace.cancel();
        }
        self.arm_grace_if_empty();
        result
    }

    fn seat_player(&mut self, player: SeatRequest) -> Result<JoinAck, RoomError> {
        if let Some(index) = self.index_of(&player.player_id) {
            return self.rebind(index, player);
        }
        if !self.status.is_joinable() || self.seats.len() >= self.config.seats {
            return Err(RoomError::RoomFull(self.room_id.clone()));
        }

        let seat = self.free_seat();
        let player_id = player.player_id.clone();
        self.seats.push(SeatEntry {
            seat,
            player_id: player.player_id,
            name: player.name,
            connection: Some(player.connection),
            sender: Some(player.sender),
            in_play: true,
            forfeit: TimerSlot::new("seat forfeit"),
        });
        self.seats.sort_by_key(|entry| entry.seat);
        self.pending.push(StoreUpdate::Seated(player_id.clone()));

        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            %seat,
            players = self.seats.len(),
            "player joined"
        );

        if self.seats.len() == self.config.seats {
            self.start_match(G::init(&self.game_config));
        }

        Ok(JoinAck {
            room_id: self.room_id.clone(),
            seat,
            state: self.snapshot()?,
        })
    }

    /// Puts a player back into the seat they already hold.
    fn rebind(&mut self, index: usize, player: SeatRequest) -> Result<JoinAck, RoomError> {
        self.grace.cancel();
        let entry = &mut self.seats[index];
        entry.forfeit.cancel();
        let was_away = entry.connection.is_none();
        entry.connection = Some(player.connection);
        entry.sender = Some(player.sender);
        entry.name = player.name;
        let seat = entry.seat;
        self.pending.push(StoreUpdate::Seated(player.player_id.clone()));

        if was_away {
            tracing::info!(room_id = %self.room_id, player_id = %player.player_id, %seat, "player rejoined");
            let room_id = self.room_id.clone();
            self.notify(Recipient::AllExcept(seat), |_| SystemMessage::PlayerRejoined {
                room_id: room_id.clone(),
                seat,
            });
        }

        Ok(JoinAck {
            room_id: self.room_id.clone(),
            seat,
            state: self.snapshot()?,
        })
    }

    fn handle_reconnect(&mut self, player: SeatRequest) -> Result<Rejoin, RoomError> {
        match self.index_of(&player.player_id) {
            Some(index) => self.rebind(index, player).map(Rejoin::Seated),
            None => Err(RoomError::NotInRoom(player.player_id, self.room_id.clone())),
        }
    }

    /// The move pipeline: membership, status, turn, validation, then an
    /// isolated apply. Any rejection leaves the state untouched.
    fn handle_move(&mut self, player_id: &PlayerId, data: &[u8]) -> Result<Vec<u8>, RoomError> {
        let seat = self.seat_of(player_id)?;
        let mv: G::Move = self
            .codec
            .decode(data)
            .map_err(|e| RoomError::BadRequest(e.to_string()))?;

        if let Some(event) = G::query(&self.state, seat, &mv) {
            self.dispatch(vec![(Recipient::Seat(seat), event)]);
            return self.snapshot();
        }

        if self.status != RoomStatus::Playing {
            return Err(RoomError::GameNotActive);
        }
        if !self.seats.iter().any(|e| e.seat == seat && e.in_play) {
            return Err(RoomError::GameNotActive);
        }
        if G::turn_order() == TurnOrder::Alternating
            && G::requires_turn(&mv)
            && G::current_turn(&self.state) != seat
        {
            return Err(RoomError::NotPlayerTurn);
        }

        let verdict = panic::catch_unwind(AssertUnwindSafe(|| {
            G::validate_move(&self.state, seat, &mv)
        }))
        .map_err(|_| self.rule_panicked(player_id, "validate_move"))?;
        verdict.map_err(|reason| {
            tracing::debug!(room_id = %self.room_id, %player_id, %reason, "move rejected");
            RoomError::InvalidMove(reason)
        })?;

        let in_play = self.in_play();
        let mut next = self.state.clone();
        let applied = panic::catch_unwind(AssertUnwindSafe(|| {
            let applied = G::apply_move(&mut next, seat, mv);
            let outcome = G::outcome(&next);
            if outcome.is_none() {
                if let NextTurn::Seat(turn) =
                    next_turn(seat, &in_play, G::turn_order(), applied.turn)
                {
                    G::set_turn(&mut next, turn);
                }
            }
            (applied.events, outcome)
        }));
        let (events, outcome) = applied.map_err(|_| self.rule_panicked(player_id, "apply_move"))?;

        let snapshot = self
            .codec
            .encode(&next)
            .map_err(|e| RoomError::Internal(e.to_string()))?;
        self.state = next;
        self.rematch_votes.clear();

        tracing::debug!(room_id = %self.room_id, %player_id, %seat, "move applied");
        self.dispatch(events);
        self.broadcast_state(&snapshot);

        if let Some(outcome) = outcome {
            self.finish(outcome, EndReason::Completed);
        }
        Ok(snapshot)
    }

    fn handle_rematch(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        let seat = self.seat_of(player_id)?;
        if self.status == RoomStatus::Waiting || self.seats.len() < self.config.seats {
            return Err(RoomError::GameNotActive);
        }

        self.rematch_votes.insert(seat);
        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            votes = self.rematch_votes.len(),
            "rematch requested"
        );

        if self.rematch_votes.len() == self.config.seats {
            let fresh = G::rematch(&self.state, &self.game_config);
            self.start_match(fresh);
        } else {
            let room_id = self.room_id.clone();
            self.notify(Recipient::AllExcept(seat), |_| {
                SystemMessage::RematchRequested {
                    room_id: room_id.clone(),
                    seat,
                }
            });
        }
        Ok(())
    }

    fn handle_surrender(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        let seat = self.seat_of(player_id)?;
        if self.status != RoomStatus::Playing
            || !self.seats.iter().any(|e| e.seat == seat && e.in_play)
        {
            return Err(RoomError::GameNotActive);
        }
        tracing::info!(room_id = %self.room_id, %player_id, %seat, "player surrendered");
        self.vacate(seat, EndReason::Surrendered);
        Ok(())
    }

    fn handle_leave(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        let seat = self.seat_of(player_id)?;
        tracing::info!(room_id = %self.room_id, %player_id, %seat, "player left");
        self.release_seat(seat, EndReason::OpponentLeft);
        Ok(())
    }

    fn handle_disconnect(
        &mut self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> DisconnectOutcome {
        let Some(index) = self.index_of(player_id) else {
            return DisconnectOutcome::Ignored;
        };
        if self.seats[index].connection != Some(connection) {
            tracing::debug!(room_id = %self.room_id, %player_id, %connection, "stale disconnect ignored");
            return DisconnectOutcome::Ignored;
        }

        let seat = self.seats[index].seat;
        let hold = self.config.disconnect_policy == DisconnectPolicy::AwaitReconnect
            && self.status == RoomStatus::Playing
            && self.seats[index].in_play;

        let outcome = if hold {
            let grace = self.config.reconnect_grace;
            let tx = self.self_tx.clone();
            let entry = &mut self.seats[index];
            entry.connection = None;
            entry.sender = None;
            entry.forfeit.arm(grace, move |token| async move {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(RoomCommand::ForfeitExpired { seat, token }).await;
                }
            });

            tracing::info!(
                room_id = %self.room_id,
                %player_id,
                %seat,
                grace_secs = grace.as_secs(),
                "player disconnected, seat held"
            );
            let room_id = self.room_id.clone();
            self.notify(Recipient::AllExcept(seat), |_| {
                SystemMessage::PlayerDisconnected {
                    room_id: room_id.clone(),
                    seat,
                    reconnect_within_secs: Some(grace.as_secs()),
                }
            });
            DisconnectOutcome::Held
        } else {
            tracing::info!(room_id = %self.room_id, %player_id, %seat, "player disconnected");
            self.release_seat(seat, EndReason::OpponentDisconnected);
            DisconnectOutcome::Released
        };

        self.arm_grace_if_empty();
        outcome
    }

    fn handle_forfeit_expired(&mut self, seat: Seat, token: TimerToken) {
        let Some(entry) = self.seats.iter_mut().find(|e| e.seat == seat) else {
            return;
        };
        if !entry.forfeit.take_if_current(token) || entry.connection.is_some() {
            return;
        }
        if self.status != RoomStatus::Playing {
            return;
        }
        tracing::info!(room_id = %self.room_id, %seat, "reconnect window expired, seat forfeits");
        self.release_seat(seat, EndReason::TimeExpired);
    }

    // -- lifecycle ----------------------------------------------------------

    fn start_match(&mut self, state: G::State) {
        debug_assert!(self.status.can_transition_to(RoomStatus::Playing));
        self.state = state;
        self.status = RoomStatus::Playing;
        self.result = None;
        self.rematch_votes.clear();
        for entry in &mut self.seats {
            entry.in_play = true;
        }

        tracing::info!(room_id = %self.room_id, players = self.seats.len(), "match started");

        let snapshot = match self.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(room_id = %self.room_id, error = %e, "failed to encode starting state");
                return;
            }
        };
        let seats: Vec<SeatInfo> = self.seats.iter().map(SeatEntry::info).collect();
        let room_id = self.room_id.clone();
        match self.notice {
            StartNotice::MatchStarted => self.notify(Recipient::All, |_| SystemMessage::MatchStarted {
                room_id: room_id.clone(),
                seats: seats.clone(),
                state: snapshot.clone(),
            }),
            StartNotice::Paired => self.notify(Recipient::All, |seat| SystemMessage::Paired {
                room_id: room_id.clone(),
                seat,
                seats: seats.clone(),
                state: snapshot.clone(),
            }),
        }
    }

    /// Takes a seat out of play. If the match is underway and at most one
    /// seat is left in play, the match ends.
    fn vacate(&mut self, seat: Seat, reason: EndReason) {
        if let Some(entry) = self.seats.iter_mut().find(|e| e.seat == seat) {
            entry.in_play = false;
            entry.forfeit.cancel();
        }
        if self.status != RoomStatus::Playing {
            return;
        }

        let remaining = self.in_play();
        match remaining.as_slice() {
            [] => self.finish(Outcome::Draw, reason),
            [winner] => self.finish(Outcome::Winner(*winner), reason),
            _ => {
                if G::current_turn(&self.state) == seat {
                    if let Some(next) = seat_after(seat, &remaining) {
                        G::set_turn(&mut self.state, next);
                    }
                }
                if let Ok(snapshot) = self.snapshot() {
                    self.broadcast_state(&snapshot);
                }
            }
        }
    }

    /// Removes a seat from the room entirely (leave, forfeit-disconnect,
    /// expired reconnect window).
    fn release_seat(&mut self, seat: Seat, reason: EndReason) {
        if let Some(entry) = self.seats.iter_mut().find(|e| e.seat == seat) {
            entry.sender = None;
            entry.connection = None;
        }
        self.vacate(seat, reason);

        if let Some(index) = self.seats.iter().position(|e| e.seat == seat) {
            let entry = self.seats.remove(index);
            self.rematch_votes.remove(&seat);
            self.pending.push(StoreUpdate::Released(entry.player_id));
        }

        let room_id = self.room_id.clone();
        self.notify(Recipient::AllExcept(seat), |_| SystemMessage::PlayerDisconnected {
            room_id: room_id.clone(),
            seat,
            reconnect_within_secs: None,
        });
    }

    fn finish(&mut self, outcome: Outcome, reason: EndReason) {
        if !self.status.can_transition_to(RoomStatus::Finished) {
            return;
        }
        self.status = RoomStatus::Finished;
        self.result = Some((outcome, reason));
        if reason != EndReason::Completed {
            G::forfeit(&mut self.state, outcome);
        }

        for entry in &mut self.seats {
            entry.forfeit.cancel();
            self.pending.push(StoreUpdate::Concluded(
                entry.player_id.clone(),
                MatchRecord {
                    room_id: self.room_id.clone(),
                    seat: entry.seat,
                    outcome,
                    reason,
                },
            ));
        }

        tracing::info!(room_id = %self.room_id, ?outcome, %reason, "match ended");
        let room_id = self.room_id.clone();
        self.notify(Recipient::All, |_| SystemMessage::MatchEnded {
            room_id: room_id.clone(),
            outcome,
            reason,
        });
    }

    /// Schedules deletion if nobody is connected and no deletion is pending.
    fn arm_grace_if_empty(&mut self) {
        if self.connected_count() > 0 || self.grace.is_armed() {
            return;
        }
        let tx = self.self_tx.clone();
        self.grace.arm(self.config.empty_room_grace, move |token| async move {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(RoomCommand::GraceExpired { token }).await;
            }
        });
        tracing::info!(
            room_id = %self.room_id,
            grace_secs = self.config.empty_room_grace.as_secs(),
            "room empty, deletion scheduled"
        );
    }

    /// Removes the room from the store along with its seat index entries.
    async fn destroy(&mut self, why: &'static str) {
        for entry in self.seats.drain(..) {
            self.pending.push(StoreUpdate::Released(entry.player_id));
        }
        self.flush().await;
        self.store
            .lock()
            .await
            .remove_room(&self.room_id, self.instance);
        tracing::info!(room_id = %self.room_id, reason = why, "room deleted");
    }

    /// Writes queued index and result changes to the shared store.
    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let updates = std::mem::take(&mut self.pending);
        let mut store = self.store.lock().await;
        for update in updates {
            store.apply(&self.room_id, update);
        }
    }

    // -- delivery -----------------------------------------------------------

    /// Sends a system notice to every addressed seat that has a connection.
    fn notify(&self, recipient: Recipient, build: impl Fn(Seat) -> SystemMessage) {
        for entry in &self.seats {
            if recipient.includes(entry.seat) {
                entry.send(RoomOutbound::System(build(entry.seat)));
            }
        }
    }

    /// Encodes and delivers game events.
    fn dispatch(&self, events: Vec<(Recipient, G::Event)>) {
        for (recipient, event) in events {
            let data = match self.codec.encode(&event) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(room_id = %self.room_id, error = %e, "failed to encode game event");
                    continue;
                }
            };
            let frame = GameFrame {
                room_id: self.room_id.clone(),
                data,
            };
            for entry in &self.seats {
                if recipient.includes(entry.seat) {
                    entry.send(RoomOutbound::Game(frame.clone()));
                }
            }
        }
    }

    fn broadcast_state(&self, snapshot: &[u8]) {
        let room_id = self.room_id.clone();
        self.notify(Recipient::All, |_| SystemMessage::StateUpdate {
            room_id: room_id.clone(),
            state: snapshot.to_vec(),
        });
    }

    // -- lookups ------------------------------------------------------------

    fn index_of(&self, player_id: &PlayerId) -> Option<usize> {
        self.seats.iter().position(|e| &e.player_id == player_id)
    }

    fn seat_of(&self, player_id: &PlayerId) -> Result<Seat, RoomError> {
        self.index_of(player_id)
            .map(|index| self.seats[index].seat)
            .ok_or_else(|| RoomError::NotInRoom(player_id.clone(), self.room_id.clone()))
    }

    /// Lowest seat index not taken.
    fn free_seat(&self) -> Seat {
        (0..=u8::MAX)
            .map(Seat)
            .find(|seat| !self.seats.iter().any(|e| e.seat == *seat))
            .unwrap_or(Seat(self.seats.len() as u8))
    }

    fn in_play(&self) -> Vec<Seat> {
        self.seats
            .iter()
            .filter(|e| e.in_play)
            .map(|e| e.seat)
            .collect()
    }

    fn connected_count(&self) -> usize {
        self.seats.iter().filter(|e| e.connection.is_some()).count()
    }

    fn snapshot(&self) -> Result<Vec<u8>, RoomError> {
        self.codec
            .encode(&self.state)
            .map_err(|e| RoomError::Internal(e.to_string()))
    }

    fn rule_panicked(&self, player_id: &PlayerId, stage: &'static str) -> RoomError {
        tracing::error!(room_id = %self.room_id, %player_id, stage, "game rule panicked, state kept");
        RoomError::Internal(format!("{stage} failed"))
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            game: G::KIND,
            status: self.status,
            player_count: self.seats.len(),
            connected_count: self.connected_count(),
            max_players: self.config.seats,
            result: self.result,
        }
    }
}

/// Spawns a room actor and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room<G: GameLogic, C: Codec>(
    room_id: RoomId,
    game_config: G::Config,
    codec: C,
    store: SharedStore,
    notice: StartNotice,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
    let config = G::room_config(&game_config);
    let state = G::init(&game_config);

    let actor = RoomActor::<G, C> {
        room_id: room_id.clone(),
        instance,
        config,
        game_config,
        status: RoomStatus::Waiting,
        seats: Vec::new(),
        state,
        result: None,
        rematch_votes: HashSet::new(),
        grace: TimerSlot::new("empty room grace"),
        notice,
        codec,
        store,
        pending: Vec::new(),
        self_tx: tx.downgrade(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        game: G::KIND,
        instance,
        sender: tx,
    }
}
