//! Room manager: creates rooms, finds them by id, and routes requests to
//! their actors.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tabletop_protocol::{Codec, PlayerId, RoomId};
use tabletop_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::catalog::{GameCatalog, GameOptions, SpawnRequest};
use crate::results::{DEFAULT_RESULT_RETENTION, MatchRecord, ResultCache};
use crate::room::StartNotice;
use crate::store::{RoomStore, SharedStore};
use crate::{
    DisconnectOutcome, JoinAck, Rejoin, RoomError, RoomHandle, RoomIdPolicy, RoomInfo,
    SeatRequest,
};

/// Attempts at a free four-digit code before falling back to a UUID.
const SHORT_CODE_ATTEMPTS: usize = 1_000;

/// The entry point for room operations from the server.
///
/// Cheap to clone; clones share the same store. Lookups by room id try an
/// exact match first and then a case-insensitive one.
///
/// A player holds at most one seat at a time: creating or joining a room
/// while seated in another active room fails with
/// [`RoomError::AlreadyInQueueOrGame`]. A seat in a finished room is given
/// up automatically.
pub struct RoomManager<C> {
    store: SharedStore,
    catalog: Arc<GameCatalog<C>>,
    codec: C,
}

impl<C: Clone> Clone for RoomManager<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            codec: self.codec.clone(),
        }
    }
}

impl<C: Codec + Clone> RoomManager<C> {
    /// Creates an empty manager hosting the games in `catalog`.
    pub fn new(catalog: GameCatalog<C>, codec: C) -> Self {
        Self::with_result_retention(catalog, codec, DEFAULT_RESULT_RETENTION)
    }

    /// Like [`new`](Self::new), keeping concluded results for `retention`.
    pub fn with_result_retention(catalog: GameCatalog<C>, codec: C, retention: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(RoomStore::new(ResultCache::new(retention)))),
            catalog: Arc::new(catalog),
            codec,
        }
    }

    pub fn catalog(&self) -> &GameCatalog<C> {
        &self.catalog
    }

    /// Creates a room and seats its creator in seat 0.
    ///
    /// # Errors
    /// - [`RoomError::UnknownGame`] if `game` is not registered.
    /// - [`RoomError::AlreadyExists`] if `requested` is taken (compared
    ///   case-insensitively).
    /// - [`RoomError::BadRequest`] for undecodable or out-of-range options.
    /// - [`RoomError::AlreadyInQueueOrGame`] if the creator is seated in
    ///   another active room.
    pub async fn create_room(
        &self,
        game: &str,
        requested: Option<RoomId>,
        options: Vec<u8>,
        player: SeatRequest,
    ) -> Result<JoinAck, RoomError> {
        let entry = self.catalog.entry(game)?;
        self.ensure_free(&player.player_id, None).await?;

        let handle = {
            let mut store = self.store.lock().await;
            let room_id = match requested {
                Some(id) if id.as_str().trim().is_empty() => {
                    return Err(RoomError::BadRequest("empty room id".into()));
                }
                Some(id) => {
                    if store.find(&id).is_some() {
                        return Err(RoomError::AlreadyExists(id));
                    }
                    id
                }
                None => generate_room_id(entry.id_policy, &store),
            };
            let handle = (entry.spawn)(SpawnRequest {
                room_id: room_id.clone(),
                options: GameOptions::Encoded(options),
                codec: self.codec.clone(),
                store: Arc::clone(&self.store),
                notice: StartNotice::MatchStarted,
            })?;
            store.rooms.insert(room_id, handle.clone());
            handle
        };

        tracing::info!(room_id = %handle.room_id(), game, player_id = %player.player_id, "room created");
        match handle.join(player).await {
            Ok(ack) => Ok(ack),
            Err(e) => {
                self.discard(&handle).await;
                Err(e)
            }
        }
    }

    /// Seats a player in an existing room.
    ///
    /// Rejoining a room the player already sits in returns their seat.
    pub async fn join_room(&self, room_id: &RoomId, player: SeatRequest) -> Result<JoinAck, RoomError> {
        let handle = self.lookup(room_id).await?;
        self.ensure_free(&player.player_id, Some(&handle)).await?;
        handle.join(player).await
    }

    /// Runs a move through the room's pipeline. Returns the encoded state
    /// after the move.
    pub async fn submit_move(
        &self,
        room_id: &RoomId,
        player_id: PlayerId,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, RoomError> {
        self.lookup(room_id).await?.submit_move(player_id, data).await
    }

    pub async fn request_rematch(&self, room_id: &RoomId, player_id: PlayerId) -> Result<(), RoomError> {
        self.lookup(room_id).await?.rematch(player_id).await
    }

    pub async fn surrender(&self, room_id: &RoomId, player_id: PlayerId) -> Result<(), RoomError> {
        self.lookup(room_id).await?.surrender(player_id).await
    }

    /// Gives up the player's seat. The room is deleted at once if nobody
    /// is left in it.
    pub async fn leave_room(&self, room_id: &RoomId, player_id: PlayerId) -> Result<(), RoomError> {
        self.lookup(room_id).await?.leave(player_id).await
    }

    /// Puts a returning player back into their seat, or tells them how the
    /// match ended if the seat is gone.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] / [`RoomError::NotInRoom`] when there is
    /// neither a seat nor a cached result for the player.
    pub async fn reconnect(&self, room_id: &RoomId, player: SeatRequest) -> Result<Rejoin, RoomError> {
        let player_id = player.player_id.clone();
        let attempt = match self.lookup(room_id).await {
            Ok(handle) => handle.reconnect(player).await,
            Err(e) => Err(e),
        };
        match attempt {
            Err(e @ (RoomError::NotFound(_) | RoomError::NotInRoom(..) | RoomError::Unavailable(_))) => {
                match self.cached_result(&player_id, room_id).await {
                    Some(record) => {
                        tracing::info!(%room_id, %player_id, "reconnect answered from result cache");
                        Ok(Rejoin::Concluded(record))
                    }
                    None => Err(e),
                }
            }
            other => other,
        }
    }

    /// Tells the player's room that `connection` closed.
    ///
    /// Returns `None` if the player holds no seat.
    pub async fn handle_disconnect(
        &self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Option<DisconnectOutcome> {
        let handle = self.seat_room(player_id).await?;
        handle.disconnect(player_id.clone(), connection).await.ok()
    }

    pub async fn room_info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        self.lookup(room_id).await?.info().await
    }

    /// Rooms still waiting for players.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::new();
        for handle in self.handles().await {
            if let Ok(info) = handle.info().await {
                if info.status.is_joinable() && info.player_count < info.max_players {
                    infos.push(info);
                }
            }
        }
        infos.sort_by(|a, b| a.room_id.as_str().cmp(b.room_id.as_str()));
        infos
    }

    /// The room the player sits in, if that room's match has not ended.
    pub async fn active_room_of(&self, player_id: &PlayerId) -> Option<RoomId> {
        let handle = self.seat_room(player_id).await?;
        let info = handle.info().await.ok()?;
        info.status.is_active().then_some(info.room_id)
    }

    /// The room the player holds a seat in, in any status.
    pub async fn room_of(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.store.lock().await.player_rooms.get(player_id).cloned()
    }

    pub async fn cached_result(&self, player_id: &PlayerId, room_id: &RoomId) -> Option<MatchRecord> {
        self.store.lock().await.results.get(player_id, room_id).cloned()
    }

    /// Drops expired cached results. Returns how many were removed.
    pub async fn prune_results(&self) -> usize {
        self.store.lock().await.results.prune()
    }

    pub async fn room_count(&self) -> usize {
        self.store.lock().await.rooms.len()
    }

    /// Stops every room actor and empties the store.
    pub async fn shutdown_all(&self) {
        let handles = {
            let mut store = self.store.lock().await;
            store.player_rooms.clear();
            store.rooms.drain().map(|(_, h)| h).collect::<Vec<_>>()
        };
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }

    /// Creates a room from a matchmaking bucket and seats `players` in
    /// queue order. Each seat receives a pairing notice when the last one
    /// is filled.
    pub(crate) async fn create_matched(
        &self,
        game: &str,
        bucket: &str,
        players: Vec<SeatRequest>,
    ) -> Result<RoomId, RoomError> {
        let entry = self.catalog.entry(game)?;
        let handle = {
            let mut store = self.store.lock().await;
            let room_id = generate_room_id(entry.id_policy, &store);
            let handle = (entry.spawn)(SpawnRequest {
                room_id: room_id.clone(),
                options: GameOptions::Bucket(bucket.to_string()),
                codec: self.codec.clone(),
                store: Arc::clone(&self.store),
                notice: StartNotice::Paired,
            })?;
            store.rooms.insert(room_id, handle.clone());
            handle
        };

        tracing::info!(room_id = %handle.room_id(), game, bucket, "matched room created");
        for player in players {
            if let Err(e) = handle.join(player).await {
                self.discard(&handle).await;
                return Err(e);
            }
        }
        Ok(handle.room_id().clone())
    }

    // -- internals ----------------------------------------------------------

    async fn lookup(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.store
            .lock()
            .await
            .find(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    async fn seat_room(&self, player_id: &PlayerId) -> Option<RoomHandle> {
        let store = self.store.lock().await;
        let room_id = store.player_rooms.get(player_id)?;
        store.rooms.get(room_id).cloned()
    }

    async fn handles(&self) -> Vec<RoomHandle> {
        self.store.lock().await.rooms.values().cloned().collect()
    }

    /// Enforces one active seat per player. `target` is the room being
    /// joined, where an existing seat is fine.
    async fn ensure_free(&self, player_id: &PlayerId, target: Option<&RoomHandle>) -> Result<(), RoomError> {
        let Some(current) = self.seat_room(player_id).await else {
            return Ok(());
        };
        if target.is_some_and(|t| t.instance() == current.instance()) {
            return Ok(());
        }
        match current.info().await {
            Ok(info) if info.status.is_active() => {
                Err(RoomError::AlreadyInQueueOrGame(player_id.clone()))
            }
            Ok(info) => {
                tracing::debug!(room_id = %info.room_id, %player_id, "leaving finished room");
                let _ = current.leave(player_id.clone()).await;
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    /// Stops a room that never got going and removes it from the store.
    async fn discard(&self, handle: &RoomHandle) {
        self.store
            .lock()
            .await
            .remove_room(handle.room_id(), handle.instance());
        let _ = handle.shutdown().await;
    }
}

fn generate_room_id(policy: RoomIdPolicy, store: &RoomStore) -> RoomId {
    if policy == RoomIdPolicy::ShortCode {
        let mut rng = rand::rng();
        for _ in 0..SHORT_CODE_ATTEMPTS {
            let id = RoomId(format!("{:04}", rng.random_range(0..10_000u32)));
            if store.find(&id).is_none() {
                return id;
            }
        }
        tracing::warn!("short room codes exhausted, using an opaque id");
    }
    RoomId(uuid::Uuid::new_v4().to_string())
}
