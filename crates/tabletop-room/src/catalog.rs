//! The game catalog: which game kinds this server can host.
//!
//! Rooms are generic over their game, but the store holds plain
//! [`RoomHandle`]s. The catalog bridges the two: for each registered kind
//! it keeps a monomorphised spawn function that decodes the kind's options
//! and starts a `RoomActor<G, C>`.

use std::collections::HashMap;

use tabletop_protocol::{Codec, RoomId};

use crate::room::{StartNotice, spawn_room};
use crate::store::SharedStore;
use crate::{GameLogic, RoomError, RoomHandle, RoomIdPolicy};

/// Command queue depth for every room actor.
pub(crate) const ROOM_CHANNEL_SIZE: usize = 64;

/// Where a new room's game options come from.
pub(crate) enum GameOptions {
    /// Client-supplied options; empty means the game's defaults.
    Encoded(Vec<u8>),
    /// A matchmaking bucket name.
    Bucket(String),
}

pub(crate) struct SpawnRequest<C> {
    pub(crate) room_id: RoomId,
    pub(crate) options: GameOptions,
    pub(crate) codec: C,
    pub(crate) store: SharedStore,
    pub(crate) notice: StartNotice,
}

pub(crate) struct CatalogEntry<C> {
    pub(crate) id_policy: RoomIdPolicy,
    pub(crate) spawn: fn(SpawnRequest<C>) -> Result<RoomHandle, RoomError>,
    has_bucket: fn(&str) -> bool,
}

/// Registered game kinds, keyed by [`GameLogic::KIND`].
///
/// ```ignore
/// let mut catalog = GameCatalog::new();
/// catalog.register::<Checkers>().register::<Hanoi>();
/// ```
pub struct GameCatalog<C> {
    entries: HashMap<&'static str, CatalogEntry<C>>,
}

impl<C: Codec + Clone> GameCatalog<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Adds a game kind. Registering the same kind twice keeps the last.
    pub fn register<G: GameLogic>(&mut self) -> &mut Self {
        tracing::debug!(game = G::KIND, "game registered");
        self.entries.insert(
            G::KIND,
            CatalogEntry {
                id_policy: G::ROOM_IDS,
                spawn: spawn_game::<G, C>,
                has_bucket: bucket_exists::<G>,
            },
        );
        self
    }

    pub fn contains(&self, game: &str) -> bool {
        self.entries.contains_key(game)
    }

    /// Returns `true` if `game` is registered and offers `bucket` for
    /// matchmaking.
    pub fn has_bucket(&self, game: &str, bucket: &str) -> bool {
        self.entries
            .get(game)
            .is_some_and(|entry| (entry.has_bucket)(bucket))
    }

    /// Registered kinds in name order.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.entries.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub(crate) fn entry(&self, game: &str) -> Result<&CatalogEntry<C>, RoomError> {
        self.entries
            .get(game)
            .ok_or_else(|| RoomError::UnknownGame(game.to_string()))
    }
}

impl<C: Codec + Clone> Default for GameCatalog<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_game<G: GameLogic, C: Codec + Clone>(
    request: SpawnRequest<C>,
) -> Result<RoomHandle, RoomError> {
    let config = match request.options {
        GameOptions::Encoded(bytes) => request
            .codec
            .decode_or_default::<G::Config>(&bytes)
            .map_err(|e| RoomError::BadRequest(format!("invalid {} options: {e}", G::KIND)))?,
        GameOptions::Bucket(bucket) => G::bucket_config(&bucket).ok_or_else(|| {
            RoomError::BadRequest(format!("{} has no bucket {bucket:?}", G::KIND))
        })?,
    };
    G::validate_config(&config).map_err(RoomError::BadRequest)?;

    Ok(spawn_room::<G, C>(
        request.room_id,
        config,
        request.codec,
        request.store,
        request.notice,
        ROOM_CHANNEL_SIZE,
    ))
}

fn bucket_exists<G: GameLogic>(bucket: &str) -> bool {
    G::bucket_config(bucket).is_some()
}
