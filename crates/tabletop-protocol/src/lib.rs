//! Wire protocol for Tabletop.
//!
//! This crate defines the messages clients and the server exchange:
//!
//! - **Types** ([`Envelope`], [`SystemMessage`], [`GameFrame`]): the
//!   request / acknowledgement / broadcast catalog.
//! - **Identities** ([`PlayerId`], [`RoomId`], [`Seat`]): stable player
//!   identity, room codes, and seats at the table.
//! - **Errors on the wire** ([`ErrorKind`]): the failure taxonomy every
//!   rejected request is reported with.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how messages become bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Channel, EndReason, Envelope, ErrorKind, GameFrame, Outcome, Payload, PlayerId,
    Recipient, RoomId, RoomListEntry, Seat, SeatInfo, SystemMessage,
};
