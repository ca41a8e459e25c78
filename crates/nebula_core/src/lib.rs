//! # NEBULA Core
//!
//! Plain data shared by every part of the client synchronization engine.
//!
//! ## Contents
//!
//! - **Math**: [`Vec2`], [`WorldBounds`] and angle helpers working in degrees
//! - **Entities**: [`EntitySnapshot`] (full state, created only by the server),
//!   [`PartialUpdate`] (high-frequency subset) and the [`Entity`] record kept by
//!   the registry
//!
//! Nothing in here knows how an entity is drawn or how a message travels.
//! Presentation and transport live behind traits in `nebula_networking`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod entity;
pub mod math;

pub use entity::{
    Angular, Entity, EntityId, EntityKind, EntitySnapshot, Faction, FeedSnapshot, PartialUpdate,
    PlayerSnapshot,
};
pub use math::{heading_degrees, normalize_degrees, Vec2, WorldBounds};
