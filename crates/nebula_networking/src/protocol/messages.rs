//! # Message Catalog
//!
//! Named inbound events and their payloads, plus the outbound move command.
//!
//! | Event | Payload |
//! |---|---|
//! | `world.newObjects` | `{current:[id…], objects:[[…fields]]}` |
//! | `world.removedObjects` | `{current:[id…], objects:[…]}` |
//! | `world.changedObjects` | `{current:[id…], objects:[[…fields]]}` |
//! | `world.updatePlayers` | `[[uid,size,mdX,mdY,traction,posX,posY,score]…]` |
//! | `player.position` | `[x,y]` or `[x,y,dtMs]` |
//! | `player.me` | `{uid,size,vertices,state:{pos,angular},score?}` |
//! | `game.status` | `{world:{bounds:{minX,minY,maxX,maxY}},factions:[…]}` |
//!
//! Id lists carry absolute ids.

use std::collections::HashSet;

use nebula_core::{
    Angular, EntityId, EntitySnapshot, PartialUpdate, PlayerSnapshot, Vec2, WorldBounds,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{WireError, WireResult};
use crate::protocol::codec::{decode_partial_update, decode_snapshot, whole_number};

/// Event names used on the wire.
pub mod events {
    /// Full snapshots of newly visible entities.
    pub const NEW_OBJECTS: &str = "world.newObjects";
    /// Entities that left the view.
    pub const REMOVED_OBJECTS: &str = "world.removedObjects";
    /// Partial updates with an authoritative id set.
    pub const CHANGED_OBJECTS: &str = "world.changedObjects";
    /// Batch of player partial updates.
    pub const UPDATE_PLAYERS: &str = "world.updatePlayers";
    /// Authoritative echo of the local player position.
    pub const PLAYER_POSITION: &str = "player.position";
    /// Local player description.
    pub const PLAYER_ME: &str = "player.me";
    /// World bounds and factions.
    pub const GAME_STATUS: &str = "game.status";
    /// Server-side error report.
    pub const GAME_ERROR: &str = "game.error";
    /// Join acknowledgement.
    pub const PLAYER_JOINED: &str = "player.joined";
    /// Another player left.
    pub const PLAYER_LEFT: &str = "player.left";
    /// Faction join acknowledgement.
    pub const PLAYER_JOINED_FACTION: &str = "player.joinedFaction";
    /// A player joined our faction.
    pub const FACTION_NEW_PLAYER: &str = "faction.newPlayer";
    /// Outbound control vector.
    pub const PLAYER_MOVE: &str = "player.move";
}

/// Raw message handed over by the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// A named event with its JSON payload.
    Event {
        /// Event name.
        name: String,
        /// Payload.
        payload: Value,
    },
    /// The connection is gone. Terminal until the next join.
    Disconnected,
}

impl InboundMessage {
    /// Builds an event message.
    #[must_use]
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            name: name.into(),
            payload,
        }
    }
}

/// One network tick's add / change / current-id sets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldTick {
    /// Full snapshots.
    pub added: Vec<EntitySnapshot>,
    /// Partial updates.
    pub changed: Vec<PartialUpdate>,
    /// Authoritative id set, if the message carried one.
    pub current_ids: Option<HashSet<EntityId>>,
    /// Updates may only touch players (`world.updatePlayers`).
    pub players_only: bool,
}

impl WorldTick {
    /// True if the tick carries nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.current_ids.is_none()
    }
}

/// Authoritative position echo for the local player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionEcho {
    /// Server position.
    pub position: Vec2,
    /// Server-measured time since the previous echo, if sent.
    pub elapsed_ms: Option<f32>,
}

/// World description from `game.status`.
#[derive(Clone, Debug, PartialEq)]
pub struct GameStatus {
    /// World rectangle.
    pub bounds: WorldBounds,
    /// Faction ids available to join.
    pub faction_ids: Vec<u64>,
}

/// Decoded server event.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    /// A reconciliation tick (`world.*`).
    Tick(WorldTick),
    /// `player.position`.
    PlayerPosition(PositionEcho),
    /// `player.me`.
    PlayerMe(PlayerSnapshot),
    /// `game.status`.
    GameStatus(GameStatus),
    /// Informational events that are only logged.
    Notice {
        /// Event name.
        name: String,
        /// Payload.
        payload: Value,
    },
}

/// A decoded value plus the records that were dropped on the way.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded<T> {
    /// The decoded value.
    pub value: T,
    /// Per-record errors; each one dropped a single record.
    pub dropped: Vec<WireError>,
}

#[derive(Deserialize)]
struct ObjectsPayload {
    #[serde(default)]
    current: Option<Vec<Value>>,
    #[serde(default)]
    objects: Vec<Value>,
}

#[derive(Deserialize)]
struct StatusPayload {
    world: StatusWorld,
    #[serde(default)]
    factions: Vec<StatusFaction>,
}

#[derive(Deserialize)]
struct StatusWorld {
    bounds: WorldBounds,
}

#[derive(Deserialize)]
struct StatusFaction {
    id: u64,
}

#[derive(Deserialize)]
struct MePayload {
    uid: u64,
    #[serde(default)]
    size: f32,
    #[serde(default)]
    vertices: Vec<Vec2>,
    state: MeState,
    #[serde(default)]
    score: f32,
}

#[derive(Deserialize)]
struct MeState {
    pos: Vec2,
    #[serde(default)]
    angular: Option<MeAngular>,
}

#[derive(Deserialize)]
struct MeAngular {
    #[serde(default)]
    pos: f32,
    #[serde(default)]
    vel: f32,
    #[serde(default)]
    acc: f32,
}

fn malformed(event: &str, reason: impl std::fmt::Display) -> WireError {
    WireError::MalformedPayload {
        event: event.to_string(),
        reason: reason.to_string(),
    }
}

fn record_fields<'a>(event: &str, record: &'a Value) -> WireResult<&'a [Value]> {
    record
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| malformed(event, "record is not an array"))
}

/// Decodes one inbound event.
///
/// Per-record problems are collected in [`Decoded::dropped`] and the rest of
/// the batch is kept.
///
/// # Errors
///
/// Returns [`WireError::UnknownEvent`] for names outside the catalog and
/// [`WireError::MalformedPayload`] when the envelope itself is unusable.
pub fn decode_event(name: &str, payload: &Value) -> WireResult<Decoded<ServerEvent>> {
    let mut dropped = Vec::new();
    let event = match name {
        events::NEW_OBJECTS => {
            let body = objects_payload(name, payload)?;
            let mut tick = WorldTick {
                current_ids: current_ids(body.current, &mut dropped),
                ..WorldTick::default()
            };
            for record in &body.objects {
                match record_fields(name, record).and_then(decode_snapshot) {
                    Ok(snapshot) => tick.added.push(snapshot),
                    Err(err) => dropped.push(err),
                }
            }
            ServerEvent::Tick(tick)
        }
        events::REMOVED_OBJECTS => {
            let body = objects_payload(name, payload)?;
            ServerEvent::Tick(WorldTick {
                current_ids: current_ids(body.current, &mut dropped),
                ..WorldTick::default()
            })
        }
        events::CHANGED_OBJECTS => {
            let body = objects_payload(name, payload)?;
            let mut tick = WorldTick {
                current_ids: current_ids(body.current, &mut dropped),
                ..WorldTick::default()
            };
            decode_updates(name, &body.objects, &mut tick, &mut dropped);
            ServerEvent::Tick(tick)
        }
        events::UPDATE_PLAYERS => {
            let records = payload
                .as_array()
                .ok_or_else(|| malformed(name, "expected an array of records"))?;
            let mut tick = WorldTick {
                players_only: true,
                ..WorldTick::default()
            };
            decode_updates(name, records, &mut tick, &mut dropped);
            ServerEvent::Tick(tick)
        }
        events::PLAYER_POSITION => ServerEvent::PlayerPosition(decode_position(payload)?),
        events::PLAYER_ME => ServerEvent::PlayerMe(decode_me(payload)?),
        events::GAME_STATUS => {
            let status = StatusPayload::deserialize(payload).map_err(|e| malformed(name, e))?;
            ServerEvent::GameStatus(GameStatus {
                bounds: WorldBounds::new(
                    Vec2::new(status.world.bounds.min_x, status.world.bounds.min_y),
                    Vec2::new(status.world.bounds.max_x, status.world.bounds.max_y),
                ),
                faction_ids: status.factions.iter().map(|f| f.id).collect(),
            })
        }
        events::GAME_ERROR
        | events::PLAYER_JOINED
        | events::PLAYER_LEFT
        | events::PLAYER_JOINED_FACTION
        | events::FACTION_NEW_PLAYER => ServerEvent::Notice {
            name: name.to_string(),
            payload: payload.clone(),
        },
        other => return Err(WireError::UnknownEvent(other.to_string())),
    };
    Ok(Decoded {
        value: event,
        dropped,
    })
}

fn objects_payload(name: &str, payload: &Value) -> WireResult<ObjectsPayload> {
    ObjectsPayload::deserialize(payload).map_err(|e| malformed(name, e))
}

/// Builds the authoritative id set. A bad entry is dropped on its own; the
/// rest of the list still counts.
fn current_ids(current: Option<Vec<Value>>, dropped: &mut Vec<WireError>) -> Option<HashSet<EntityId>> {
    let values = current?;
    let mut ids = HashSet::with_capacity(values.len());
    for value in &values {
        match whole_number(value) {
            Some(id) => {
                ids.insert(EntityId(id));
            }
            None => dropped.push(WireError::InvalidField {
                kind: "current",
                field: "id",
            }),
        }
    }
    Some(ids)
}

fn decode_updates(name: &str, records: &[Value], tick: &mut WorldTick, dropped: &mut Vec<WireError>) {
    for record in records {
        match record_fields(name, record).and_then(decode_partial_update) {
            Ok(update) => tick.changed.push(update),
            Err(err) => dropped.push(err),
        }
    }
}

fn decode_position(payload: &Value) -> WireResult<PositionEcho> {
    let name = events::PLAYER_POSITION;
    let values = payload
        .as_array()
        .ok_or_else(|| malformed(name, "expected [x, y] or [x, y, dt]"))?;
    if !(2..=3).contains(&values.len()) {
        return Err(WireError::ArityRange {
            kind: "position",
            min: 2,
            max: 3,
            actual: values.len(),
        });
    }
    let number = |index: usize| -> WireResult<f32> {
        values
            .get(index)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .map(|v| v as f32)
            .ok_or_else(|| malformed(name, format!("field {index} is not a number")))
    };
    let elapsed_ms = if values.len() == 3 {
        Some(number(2)?)
    } else {
        None
    };
    Ok(PositionEcho {
        position: Vec2::new(number(0)?, number(1)?),
        elapsed_ms,
    })
}

fn decode_me(payload: &Value) -> WireResult<PlayerSnapshot> {
    let me = MePayload::deserialize(payload).map_err(|e| malformed(events::PLAYER_ME, e))?;
    let angular = me.state.angular.map_or_else(Angular::default, |a| Angular {
        pos: a.pos,
        vel: a.vel,
        acc: a.acc,
    });
    Ok(PlayerSnapshot {
        id: EntityId(me.uid),
        size: me.size,
        vertices: me.vertices,
        heading: Vec2::ZERO,
        traction: 0.0,
        position: me.state.pos,
        angular,
        score: me.score,
        nickname: None,
        faction: None,
    })
}

/// Outbound control vector, sent as `player.move`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoveCommand {
    /// Heading.
    pub heading: Vec2,
    /// Traction.
    pub traction: f32,
}

impl MoveCommand {
    /// Serializes as `[headingX, headingY, traction]`, each rounded to
    /// `precision` decimal places.
    #[must_use]
    pub fn to_payload(&self, precision: u32) -> Value {
        let scale = 10f64.powi(precision as i32);
        let round = |v: f32| -> Value {
            let rounded = (f64::from(v) * scale).round() / scale;
            // -0.0 serializes as "-0.0"
            Value::from(if rounded == 0.0 { 0.0 } else { rounded })
        };
        Value::Array(vec![
            round(self.heading.x),
            round(self.heading.y),
            round(self.traction),
        ])
    }
}
