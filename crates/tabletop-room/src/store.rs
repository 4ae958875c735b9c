//! Shared index of live rooms and who sits where.
//!
//! Both the [`RoomManager`](crate::RoomManager) and every room actor hold
//! the same `Arc<Mutex<RoomStore>>`. Nobody awaits a room actor while
//! holding the lock: the manager clones a handle and releases the lock
//! before sending a command, and actors only take the lock to write back
//! their own changes.

use std::collections::HashMap;
use std::sync::Arc;

use tabletop_protocol::{PlayerId, RoomId};
use tokio::sync::Mutex;

use crate::RoomHandle;
use crate::results::{MatchRecord, ResultCache};

pub(crate) type SharedStore = Arc<Mutex<RoomStore>>;

pub(crate) struct RoomStore {
    pub(crate) rooms: HashMap<RoomId, RoomHandle>,

    /// The room each player currently holds a seat in. Written only by
    /// room actors.
    pub(crate) player_rooms: HashMap<PlayerId, RoomId>,

    pub(crate) results: ResultCache,
}

impl RoomStore {
    pub(crate) fn new(results: ResultCache) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            results,
        }
    }

    /// Exact lookup first, then a case-insensitive scan.
    pub(crate) fn find(&self, room_id: &RoomId) -> Option<&RoomHandle> {
        self.rooms.get(room_id).or_else(|| {
            self.rooms
                .iter()
                .find(|(id, _)| id.matches_ignore_case(room_id))
                .map(|(_, handle)| handle)
        })
    }

    /// Removes `room_id` only if it still maps to the actor `instance`;
    /// a newer room may have reused the id.
    pub(crate) fn remove_room(&mut self, room_id: &RoomId, instance: u64) -> bool {
        let same = self
            .rooms
            .get(room_id)
            .is_some_and(|handle| handle.instance() == instance);
        if same {
            self.rooms.remove(room_id);
        }
        same
    }

    /// Drops the player's index entry if it still points at `room_id`.
    pub(crate) fn release_player(&mut self, player_id: &PlayerId, room_id: &RoomId) {
        if self.player_rooms.get(player_id) == Some(room_id) {
            self.player_rooms.remove(player_id);
        }
    }

    pub(crate) fn apply(&mut self, room_id: &RoomId, update: StoreUpdate) {
        match update {
            StoreUpdate::Seated(player_id) => {
                self.player_rooms.insert(player_id, room_id.clone());
            }
            StoreUpdate::Released(player_id) => self.release_player(&player_id, room_id),
            StoreUpdate::Concluded(player_id, record) => self.results.record(player_id, record),
        }
    }
}

/// A change a room actor queues while handling a command and writes to
/// the store before it replies.
#[derive(Debug)]
pub(crate) enum StoreUpdate {
    Seated(PlayerId),
    Released(PlayerId),
    Concluded(PlayerId, MatchRecord),
}
