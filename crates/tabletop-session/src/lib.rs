//! Connection and player-identity bookkeeping for Tabletop.
//!
//! Two registries live here:
//!
//! 1. [`ConnectionRegistry`]: every live transport connection, keyed by
//!    [`ConnectionId`](tabletop_transport::ConnectionId). Duplicate
//!    registrations are rejected.
//! 2. [`SessionManager`]: stable player identities. A player keeps the
//!    same [`PlayerId`](tabletop_protocol::PlayerId) across reconnects
//!    even though every reconnect arrives on a new connection.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← seats reference a PlayerId, never a connection
//!     ↕
//! Session Layer (this)   ← which connection speaks for which player
//!     ↕
//! Transport (below)      ← ConnectionId, remote address, accept time
//! ```

mod error;
mod manager;
mod registry;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use registry::{ConnectionRegistry, RegisteredConnection};
pub use session::{Session, SessionConfig, SessionState};
