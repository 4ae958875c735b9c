//! Recently concluded matches, kept so a player who reconnects after the
//! room is gone still learns how it ended.

use std::collections::HashMap;
use std::time::Duration;

use tabletop_protocol::{EndReason, Outcome, PlayerId, RoomId, Seat};
use tokio::time::Instant;

/// How long a concluded match stays answerable.
pub const DEFAULT_RESULT_RETENTION: Duration = Duration::from_secs(300);

/// One player's view of a concluded match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub room_id: RoomId,
    pub seat: Seat,
    pub outcome: Outcome,
    pub reason: EndReason,
}

/// Last concluded match per player, expiring after a retention period.
#[derive(Debug)]
pub struct ResultCache {
    retention: Duration,
    entries: HashMap<PlayerId, (MatchRecord, Instant)>,
}

impl ResultCache {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            entries: HashMap::new(),
        }
    }

    /// Stores `record`, replacing any older one for the player.
    pub fn record(&mut self, player_id: PlayerId, record: MatchRecord) {
        self.entries.insert(player_id, (record, Instant::now()));
    }

    /// The player's cached result for `room_id` (matched case-insensitively),
    /// if it has not expired.
    pub fn get(&self, player_id: &PlayerId, room_id: &RoomId) -> Option<&MatchRecord> {
        self.entries
            .get(player_id)
            .filter(|(record, at)| {
                at.elapsed() < self.retention && record.room_id.matches_ignore_case(room_id)
            })
            .map(|(record, _)| record)
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        let retention = self.retention;
        self.entries.retain(|_, (_, at)| at.elapsed() < retention);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_RETENTION)
    }
}
