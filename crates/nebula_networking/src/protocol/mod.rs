//! # Wire Protocol
//!
//! JSON/array encoded messages exchanged with the game server.
//!
//! ## Message Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ event name ("world.changedObjects")                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │ payload: { current: [id…], objects: [[f0, f1, …], …] }       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities travel as fixed-shape positional arrays instead of keyed
//! objects. The layout is selected by a type tag and validated by length
//! before anything is read.

mod codec;
mod messages;

pub use codec::{
    decode_partial_update, decode_snapshot, encode_feed, encode_partial_update, encode_player,
    FEED_ARITY, FEED_FIELDS, FEED_TAG, PARTIAL_ARITY, PARTIAL_FIELDS, PLAYER_ARITY, PLAYER_FIELDS,
    PLAYER_TAG,
};
pub use messages::{
    decode_event, events, Decoded, GameStatus, InboundMessage, MoveCommand, PositionEcho,
    ServerEvent, WorldTick,
};
