//! Per-connection handler: handshake, request dispatch and the outbound
//! fan-in of room broadcasts.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register the connection
//!   2. Receive Handshake → validate version → open the player's session
//!   3. Send HandshakeAck → player is connected
//!   4. Loop: client envelopes are answered in order, room broadcasts are
//!      forwarded as they arrive
//!   5. On close: unregister, leave the queue, tell the player's room

use std::sync::Arc;
use std::time::Instant;

use tabletop_protocol::{
    Codec, Envelope, ErrorKind, GameFrame, Payload, PlayerId, ProtocolError, RoomListEntry,
    SystemMessage,
};
use tabletop_room::{QueueOutcome, Rejoin, RoomError, RoomOutbound, SeatRequest};
use tabletop_session::SessionError;
use tabletop_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::TabletopError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// The sending half of one client connection.
///
/// Owns the outgoing sequence counter so acknowledgements and broadcasts
/// share one monotonic `seq`.
struct Outbox<'a, C> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    started: Instant,
    seq: u64,
}

impl<C: Codec> Outbox<'_, C> {
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    async fn send(&mut self, payload: Payload, ack: Option<u64>) -> Result<(), TabletopError> {
        let mut envelope = Envelope::new(self.seq, self.elapsed_ms(), payload);
        self.seq += 1;
        if let Some(request) = ack {
            envelope = envelope.answering(request);
        }
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn reply(&mut self, request: u64, msg: SystemMessage) -> Result<(), TabletopError> {
        self.send(Payload::System(msg), Some(request)).await
    }

    async fn error(
        &mut self,
        request: Option<u64>,
        kind: ErrorKind,
        message: String,
    ) -> Result<(), TabletopError> {
        let msg = SystemMessage::Error {
            kind,
            code: kind.code(),
            message,
        };
        self.send(Payload::System(msg), request).await
    }

    async fn room_error(&mut self, request: u64, err: RoomError) -> Result<(), TabletopError> {
        self.error(Some(request), err.kind(), err.to_string()).await
    }
}

/// The identity a connection speaks for after its handshake.
struct Player {
    id: PlayerId,
    name: String,
    connection: ConnectionId,
    sender: mpsc::UnboundedSender<RoomOutbound>,
}

impl Player {
    fn seat_request(&self) -> SeatRequest {
        SeatRequest {
            player_id: self.id.clone(),
            name: self.name.clone(),
            connection: self.connection,
            sender: self.sender.clone(),
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), TabletopError>
where
    C: Codec + Clone,
{
    let conn_id = conn.id();
    let registered = state.registry.lock().await.register(conn.info());
    if let Err(e) = registered {
        let _ = conn.close().await;
        return Err(e.into());
    }
    tracing::debug!(%conn_id, "handling new connection");

    let mut outbox = Outbox {
        conn: &conn,
        codec: &state.codec,
        started: Instant::now(),
        seq: 1,
    };
    let (sender, mut inbox) = mpsc::unbounded_channel();

    let player = match perform_handshake(&conn, &state, &mut outbox, sender).await {
        Ok(player) => player,
        Err(e) => {
            state.registry.lock().await.unregister(conn_id);
            let _ = conn.close().await;
            return Err(e);
        }
    };
    tracing::info!(%conn_id, player_id = %player.id, name = %player.name, "player connected");

    let result = message_loop(&conn, &state, &mut outbox, &player, &mut inbox).await;

    release(&state, &player).await;
    let _ = conn.close().await;
    result
}

/// Receive Handshake, validate, open the session, send the ack.
async fn perform_handshake<C>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    outbox: &mut Outbox<'_, C>,
    sender: mpsc::UnboundedSender<RoomOutbound>,
) -> Result<Player, TabletopError>
where
    C: Codec + Clone,
{
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(invalid("connection closed before handshake"));
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(invalid("handshake timed out")),
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    let (version, name, requested) = match envelope.payload {
        Payload::System(SystemMessage::Handshake {
            version,
            name,
            player_id,
        }) => (version, name, player_id),
        _ => {
            outbox
                .error(Some(envelope.seq), ErrorKind::BadRequest, "expected Handshake".into())
                .await?;
            return Err(invalid("first message must be Handshake"));
        }
    };

    if version != PROTOCOL_VERSION {
        outbox
            .error(
                Some(envelope.seq),
                ErrorKind::BadRequest,
                format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            )
            .await?;
        return Err(invalid("protocol version mismatch"));
    }

    let connection = conn.id();
    let opened = state
        .sessions
        .lock()
        .await
        .open(&name, requested, connection)
        .map(|session| (session.player_id.clone(), session.name.clone()));
    let (player_id, name) = match opened {
        Ok(identity) => identity,
        Err(e) => {
            let kind = match e {
                SessionError::AlreadyConnected(_) => ErrorKind::AlreadyInQueueOrGame,
                _ => ErrorKind::BadRequest,
            };
            outbox.error(Some(envelope.seq), kind, e.to_string()).await?;
            return Err(e.into());
        }
    };
    state
        .registry
        .lock()
        .await
        .bind_player(connection, player_id.clone())?;

    let server_time = outbox.elapsed_ms();
    outbox
        .reply(
            envelope.seq,
            SystemMessage::HandshakeAck {
                connection_id: connection.into_inner(),
                player_id: player_id.clone(),
                server_time,
            },
        )
        .await?;

    Ok(Player {
        id: player_id,
        name,
        connection,
        sender,
    })
}

async fn message_loop<C>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    outbox: &mut Outbox<'_, C>,
    player: &Player,
    inbox: &mut mpsc::UnboundedReceiver<RoomOutbound>,
) -> Result<(), TabletopError>
where
    C: Codec + Clone,
{
    let player_id = &player.id;
    let mut deadline = tokio::time::Instant::now() + state.idle_timeout;

    loop {
        tokio::select! {
            // The handler keeps a sender, so the inbox never closes here.
            Some(outbound) = inbox.recv() => {
                let payload = match outbound {
                    RoomOutbound::System(msg) => Payload::System(msg),
                    RoomOutbound::Game(frame) => Payload::Game(frame),
                };
                outbox.send(payload, None).await?;
            }
            () = tokio::time::sleep_until(deadline) => {
                tracing::info!(%player_id, "connection idle, closing");
                return Ok(());
            }
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%player_id, "connection closed cleanly");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        return Ok(());
                    }
                };
                deadline = tokio::time::Instant::now() + state.idle_timeout;

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                        outbox.error(None, ErrorKind::BadRequest, e.to_string()).await?;
                        continue;
                    }
                };

                let request = envelope.seq;
                match envelope.payload {
                    Payload::System(msg) => {
                        if handle_system_message(state, outbox, player, request, msg).await? {
                            return Ok(());
                        }
                    }
                    Payload::Game(frame) => {
                        handle_game_frame(state, outbox, player, request, frame).await?;
                    }
                }
            }
        }
    }
}

/// Handles a system request. Returns `true` if the connection should close.
async fn handle_system_message<C>(
    state: &ServerState<C>,
    outbox: &mut Outbox<'_, C>,
    player: &Player,
    request: u64,
    msg: SystemMessage,
) -> Result<bool, TabletopError>
where
    C: Codec + Clone,
{
    let player_id = &player.id;
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let server_time = outbox.elapsed_ms();
            outbox
                .reply(
                    request,
                    SystemMessage::HeartbeatAck {
                        client_time,
                        server_time,
                    },
                )
                .await?;
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return Ok(true);
        }

        SystemMessage::CreateRoom {
            game,
            room_id,
            options,
        } => {
            state.matchmaker.leave_queue(player_id).await;
            let created = state
                .rooms
                .create_room(&game, room_id, options, player.seat_request())
                .await;
            match created {
                Ok(ack) => {
                    let msg = SystemMessage::RoomJoined {
                        room_id: ack.room_id,
                        seat: ack.seat,
                        state: ack.state,
                    };
                    outbox.reply(request, msg).await?;
                }
                Err(e) => {
                    tracing::debug!(%player_id, %game, error = %e, "create room rejected");
                    outbox.room_error(request, e).await?;
                }
            }
        }

        SystemMessage::JoinRoom { room_id } => {
            state.matchmaker.leave_queue(player_id).await;
            match state.rooms.join_room(&room_id, player.seat_request()).await {
                Ok(ack) => {
                    let msg = SystemMessage::RoomJoined {
                        room_id: ack.room_id,
                        seat: ack.seat,
                        state: ack.state,
                    };
                    outbox.reply(request, msg).await?;
                }
                Err(e) => {
                    tracing::debug!(%player_id, %room_id, error = %e, "join rejected");
                    outbox.room_error(request, e).await?;
                }
            }
        }

        SystemMessage::Rematch { room_id } => {
            let result = state.rooms.request_rematch(&room_id, player_id.clone()).await;
            ack_or_error(outbox, request, result).await?;
        }

        SystemMessage::Surrender { room_id } => {
            let result = state.rooms.surrender(&room_id, player_id.clone()).await;
            ack_or_error(outbox, request, result).await?;
        }

        SystemMessage::LeaveRoom { room_id } => {
            let result = state.rooms.leave_room(&room_id, player_id.clone()).await;
            ack_or_error(outbox, request, result).await?;
        }

        SystemMessage::Reconnect {
            room_id,
            player_id: claimed,
        } => {
            if &claimed != player_id {
                outbox
                    .error(
                        Some(request),
                        ErrorKind::PlayerNotInRoom,
                        format!("connection speaks for {player_id}, not {claimed}"),
                    )
                    .await?;
                return Ok(false);
            }
            match state.rooms.reconnect(&room_id, player.seat_request()).await {
                Ok(Rejoin::Seated(ack)) => {
                    let msg = SystemMessage::RoomJoined {
                        room_id: ack.room_id,
                        seat: ack.seat,
                        state: ack.state,
                    };
                    outbox.reply(request, msg).await?;
                }
                Ok(Rejoin::Concluded(record)) => {
                    let msg = SystemMessage::MatchResult {
                        room_id: record.room_id,
                        outcome: record.outcome,
                        reason: record.reason,
                    };
                    outbox.reply(request, msg).await?;
                }
                Err(e) => {
                    tracing::debug!(%player_id, %room_id, error = %e, "reconnect rejected");
                    outbox.room_error(request, e).await?;
                }
            }
        }

        SystemMessage::JoinQueue { game, bucket } => {
            let queued = state
                .matchmaker
                .join_queue(&game, &bucket, player.seat_request())
                .await;
            match queued {
                Ok(outcome) => {
                    if let QueueOutcome::Paired(room_id) = &outcome {
                        tracing::debug!(%player_id, %room_id, "paired on arrival");
                    }
                    outbox
                        .reply(request, SystemMessage::QueueJoined { bucket })
                        .await?;
                }
                Err(e) => {
                    tracing::debug!(%player_id, %game, %bucket, error = %e, "queue join rejected");
                    outbox.room_error(request, e).await?;
                }
            }
        }

        SystemMessage::ListRooms => {
            let rooms = state
                .rooms
                .list_rooms()
                .await
                .into_iter()
                .map(|info| RoomListEntry {
                    room_id: info.room_id,
                    game: info.game.to_string(),
                    player_count: info.player_count,
                    max_players: info.max_players,
                })
                .collect();
            outbox
                .reply(request, SystemMessage::RoomList { rooms })
                .await?;
        }

        other => {
            tracing::debug!(%player_id, message = ?other, "unexpected system message");
            outbox
                .error(
                    Some(request),
                    ErrorKind::BadRequest,
                    "not a client request".into(),
                )
                .await?;
        }
    }

    Ok(false)
}

/// Routes a move to its room and answers with the committed state.
async fn handle_game_frame<C>(
    state: &ServerState<C>,
    outbox: &mut Outbox<'_, C>,
    player: &Player,
    request: u64,
    frame: GameFrame,
) -> Result<(), TabletopError>
where
    C: Codec + Clone,
{
    let GameFrame { room_id, data } = frame;
    match state.rooms.submit_move(&room_id, player.id.clone(), data).await {
        Ok(snapshot) => {
            let msg = SystemMessage::MoveAccepted {
                room_id,
                state: snapshot,
            };
            outbox.reply(request, msg).await
        }
        Err(e) => {
            tracing::debug!(player_id = %player.id, %room_id, error = %e, "move rejected");
            outbox.room_error(request, e).await
        }
    }
}

async fn ack_or_error<C: Codec>(
    outbox: &mut Outbox<'_, C>,
    request: u64,
    result: Result<(), RoomError>,
) -> Result<(), TabletopError> {
    match result {
        Ok(()) => outbox.reply(request, SystemMessage::Ack).await,
        Err(e) => outbox.room_error(request, e).await,
    }
}

/// Fans a closed connection out to every owner of player state.
async fn release<C: Codec + Clone>(state: &ServerState<C>, player: &Player) {
    let player_id = &player.id;
    state.registry.lock().await.unregister(player.connection);
    if let Err(e) = state
        .sessions
        .lock()
        .await
        .disconnect(player_id, player.connection)
    {
        tracing::debug!(%player_id, error = %e, "session already gone");
    }
    state.matchmaker.leave_queue(player_id).await;
    if let Some(outcome) = state
        .rooms
        .handle_disconnect(player_id, player.connection)
        .await
    {
        tracing::debug!(%player_id, ?outcome, "room notified of disconnect");
    }
}

fn invalid(reason: &str) -> TabletopError {
    TabletopError::Protocol(ProtocolError::InvalidMessage(reason.into()))
}
