//! Cancellable deferred timers for Tabletop.
//!
//! Turn-based rooms have no tick loop; their only clocks are one-shot
//! deadlines: deleting an empty room after a grace period, giving up on a
//! matchmaking wait, forfeiting a seat that never came back.
//!
//! Scheduling and firing are not atomic with the rest of the server, so a
//! timer never acts on its own. It delivers a [`TimerToken`] back to its
//! owner (usually by sending a command into a room actor's channel), and
//! the owner checks [`TimerSlot::take_if_current`] before doing anything.
//! A token from a cancelled or re-armed timer is simply stale.
//!
//! # Integration
//!
//! ```ignore
//! // Inside a room actor:
//! let tx = self.self_tx.clone();
//! self.grace.arm(Duration::from_secs(60), move |token| async move {
//!     let _ = tx.send(RoomCommand::GraceExpired { token }).await;
//! });
//!
//! // Later, when the command arrives:
//! RoomCommand::GraceExpired { token } => {
//!     if self.grace.take_if_current(token) && self.is_empty() {
//!         self.destroy();
//!     }
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::trace;

// ---------------------------------------------------------------------------
// TimerToken
// ---------------------------------------------------------------------------

/// Identifies one arming of a [`TimerSlot`].
///
/// Every call to [`TimerSlot::arm`] produces a new token; cancelling or
/// re-arming makes earlier tokens stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Builds a token for a timer scheduled outside a [`TimerSlot`].
    pub fn new(generation: u64) -> Self {
        Self(generation)
    }

    /// Returns the arming generation this token belongs to.
    pub fn generation(self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// TimerHandle
// ---------------------------------------------------------------------------

/// A running one-shot timer. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    token: TimerToken,
    deadline: Instant,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// The token the timer will deliver when it fires.
    pub fn token(&self) -> TimerToken {
        self.token
    }

    /// When the timer fires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns `true` once the timer task has run to completion.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the timer. A callback that has not started will never run.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns a one-shot timer that calls `fire(token)` after `delay`.
///
/// Prefer [`TimerSlot::arm`], which also tracks staleness.
pub fn schedule<F, Fut>(delay: Duration, token: TimerToken, fire: F) -> TimerHandle
where
    F: FnOnce(TimerToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let deadline = Instant::now() + delay;
    let task = tokio::spawn(async move {
        time::sleep_until(deadline).await;
        trace!(generation = token.0, "timer fired");
        fire(token).await;
    });
    TimerHandle {
        token,
        deadline,
        task,
    }
}

// ---------------------------------------------------------------------------
// TimerSlot
// ---------------------------------------------------------------------------

/// Holds at most one pending timer for a single purpose (a room's
/// deletion grace, one seat's forfeit countdown, one queue entry's wait).
#[derive(Debug)]
pub struct TimerSlot {
    label: &'static str,
    generation: u64,
    pending: Option<TimerHandle>,
}

impl TimerSlot {
    /// Creates an idle slot. `label` only appears in logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            generation: 0,
            pending: None,
        }
    }

    /// Arms the slot, cancelling whatever was pending first.
    ///
    /// Returns the token `fire` will receive.
    pub fn arm<F, Fut>(&mut self, delay: Duration, fire: F) -> TimerToken
    where
        F: FnOnce(TimerToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let token = TimerToken(self.generation);
        self.pending = Some(schedule(delay, token, fire));
        trace!(
            label = self.label,
            generation = token.0,
            delay_ms = delay.as_millis() as u64,
            "timer armed"
        );
        token
    }

    /// Cancels the pending timer, if any. Returns `true` if one was pending.
    ///
    /// Any token the cancelled timer already delivered becomes stale.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                trace!(label = self.label, generation = handle.token.0, "timer cancelled");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `token` belongs to the timer currently armed.
    pub fn is_current(&self, token: TimerToken) -> bool {
        self.pending.as_ref().is_some_and(|h| h.token == token)
    }

    /// Staleness check for the fire path: if `token` is current, disarms
    /// the slot and returns `true`; otherwise leaves it alone.
    pub fn take_if_current(&mut self, token: TimerToken) -> bool {
        if self.is_current(token) {
            self.pending = None;
            true
        } else {
            trace!(label = self.label, generation = token.0, "stale timer token ignored");
            false
        }
    }

    /// Returns `true` while a timer is pending.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left on the pending timer.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending.as_ref().map(TimerHandle::remaining)
    }
}
