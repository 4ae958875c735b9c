//! Matchmaking: FIFO queues per game and bucket.
//!
//! A player joining a bucket that already has someone waiting is paired
//! with the longest-waiting player at once; otherwise they wait until an
//! opponent arrives or their queue timeout fires.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tabletop_protocol::{Codec, PlayerId, RoomId, SystemMessage};
use tabletop_timer::{TimerSlot, TimerToken};
use tokio::sync::Mutex;

use crate::{RoomError, RoomManager, RoomOutbound, SeatRequest};

/// Matchmaking settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchmakingConfig {
    /// How long a player waits for an opponent before being told to retry.
    pub queue_timeout: Duration,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            queue_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of joining a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Nobody was waiting; the player is queued.
    Waiting,
    /// The player was paired and seated in a new room.
    Paired(RoomId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    game: String,
    bucket: String,
}

struct QueuedPlayer {
    player: SeatRequest,
    timeout: TimerSlot,
}

#[derive(Default)]
struct Queues {
    buckets: HashMap<BucketKey, VecDeque<QueuedPlayer>>,
    queued: HashMap<PlayerId, BucketKey>,
}

impl Queues {
    /// Longest-waiting player in `key` whose connection is still open.
    fn pop_front(&mut self, key: &BucketKey) -> Option<QueuedPlayer> {
        let queue = self.buckets.get_mut(key)?;
        let mut found = None;
        while let Some(entry) = queue.pop_front() {
            self.queued.remove(&entry.player.player_id);
            if entry.player.sender.is_closed() {
                continue;
            }
            found = Some(entry);
            break;
        }
        if queue.is_empty() {
            self.buckets.remove(key);
        }
        found
    }

    fn push(&mut self, key: BucketKey, entry: QueuedPlayer) {
        self.queued
            .insert(entry.player.player_id.clone(), key.clone());
        self.buckets.entry(key).or_default().push_back(entry);
    }

    fn remove(&mut self, player_id: &PlayerId) -> Option<QueuedPlayer> {
        let key = self.queued.remove(player_id)?;
        let queue = self.buckets.get_mut(&key)?;
        let index = queue.iter().position(|e| &e.player.player_id == player_id)?;
        let entry = queue.remove(index);
        if queue.is_empty() {
            self.buckets.remove(&key);
        }
        entry
    }
}

/// Pairs players waiting in the same game bucket.
///
/// Cheap to clone; clones share the same queues.
pub struct Matchmaker<C> {
    rooms: RoomManager<C>,
    queues: Arc<Mutex<Queues>>,
    config: MatchmakingConfig,
}

impl<C: Clone> Clone for Matchmaker<C> {
    fn clone(&self) -> Self {
        Self {
            rooms: self.rooms.clone(),
            queues: Arc::clone(&self.queues),
            config: self.config.clone(),
        }
    }
}

impl<C: Codec + Clone> Matchmaker<C> {
    pub fn new(rooms: RoomManager<C>, config: MatchmakingConfig) -> Self {
        Self {
            rooms,
            queues: Arc::new(Mutex::new(Queues::default())),
            config,
        }
    }

    /// Queues a player, or pairs them with whoever has waited longest.
    ///
    /// # Errors
    /// - [`RoomError::UnknownGame`] / [`RoomError::BadRequest`] for an
    ///   unknown game or bucket.
    /// - [`RoomError::AlreadyInQueueOrGame`] if the player is already
    ///   queued (the stale entry is dropped, so a retry succeeds) or holds
    ///   a seat in an active room.
    pub async fn join_queue(
        &self,
        game: &str,
        bucket: &str,
        player: SeatRequest,
    ) -> Result<QueueOutcome, RoomError> {
        let catalog = self.rooms.catalog();
        if !catalog.contains(game) {
            return Err(RoomError::UnknownGame(game.to_string()));
        }
        if !catalog.has_bucket(game, bucket) {
            return Err(RoomError::BadRequest(format!("{game} has no bucket {bucket:?}")));
        }

        let player_id = player.player_id.clone();
        if self.leave_queue(&player_id).await {
            tracing::warn!(%player_id, "player was already queued, stale entry removed");
            return Err(RoomError::AlreadyInQueueOrGame(player_id));
        }
        if self.rooms.active_room_of(&player_id).await.is_some() {
            return Err(RoomError::AlreadyInQueueOrGame(player_id));
        }

        let key = BucketKey {
            game: game.to_string(),
            bucket: bucket.to_string(),
        };
        let mut queues = self.queues.lock().await;

        if let Some(mut opponent) = queues.pop_front(&key) {
            // Pairing cancels the opponent's pending timeout first.
            opponent.timeout.cancel();
            // Held until both seats exist: a concurrent `leave_queue` for the
            // opponent waits here, and its disconnect then finds the seat.
            let paired = self.pair(&key, opponent, player).await;
            drop(queues);
            return paired;
        }

        let mut entry = QueuedPlayer {
            player,
            timeout: TimerSlot::new("queue timeout"),
        };
        let weak = Arc::downgrade(&self.queues);
        let expired_key = key.clone();
        let expired_player = player_id.clone();
        entry
            .timeout
            .arm(self.config.queue_timeout, move |token| async move {
                if let Some(queues) = weak.upgrade() {
                    expire(queues, expired_key, expired_player, token).await;
                }
            });
        queues.push(key, entry);

        tracing::info!(%player_id, game, bucket, "player queued");
        Ok(QueueOutcome::Waiting)
    }

    /// Drops the player's queue entry, if any. Returns `true` if one existed.
    pub async fn leave_queue(&self, player_id: &PlayerId) -> bool {
        match self.queues.lock().await.remove(player_id) {
            Some(mut entry) => {
                entry.timeout.cancel();
                tracing::debug!(%player_id, "player left queue");
                true
            }
            None => false,
        }
    }

    pub async fn is_queued(&self, player_id: &PlayerId) -> bool {
        self.queues.lock().await.queued.contains_key(player_id)
    }

    /// Players waiting in one bucket.
    pub async fn queue_len(&self, game: &str, bucket: &str) -> usize {
        let key = BucketKey {
            game: game.to_string(),
            bucket: bucket.to_string(),
        };
        self.queues
            .lock()
            .await
            .buckets
            .get(&key)
            .map_or(0, VecDeque::len)
    }

    async fn pair(
        &self,
        key: &BucketKey,
        opponent: QueuedPlayer,
        player: SeatRequest,
    ) -> Result<QueueOutcome, RoomError> {
        tracing::info!(
            first = %opponent.player.player_id,
            second = %player.player_id,
            game = %key.game,
            bucket = %key.bucket,
            "players paired"
        );
        let waiting = opponent.player.clone();
        match self
            .rooms
            .create_matched(&key.game, &key.bucket, vec![opponent.player, player])
            .await
        {
            Ok(room_id) => Ok(QueueOutcome::Paired(room_id)),
            Err(e) => {
                tracing::warn!(error = %e, game = %key.game, "failed to create matched room");
                let _ = waiting.sender.send(RoomOutbound::System(SystemMessage::QueueTimeout {
                    bucket: key.bucket.clone(),
                }));
                Err(e)
            }
        }
    }
}

/// Timer path: removes the entry if `token` is still its current timeout
/// and tells the player to retry.
async fn expire(queues: Arc<Mutex<Queues>>, key: BucketKey, player_id: PlayerId, token: TimerToken) {
    let mut queues = queues.lock().await;
    let current = queues
        .buckets
        .get(&key)
        .and_then(|q| q.iter().find(|e| e.player.player_id == player_id))
        .is_some_and(|e| e.timeout.is_current(token));
    if !current {
        return;
    }
    let Some(mut entry) = queues.remove(&player_id) else {
        return;
    };
    entry.timeout.take_if_current(token);

    tracing::info!(%player_id, game = %key.game, bucket = %key.bucket, "queue wait timed out");
    let _ = entry
        .player
        .sender
        .send(RoomOutbound::System(SystemMessage::QueueTimeout { bucket: key.bucket }));
}
