//! # Wire Codec
//!
//! Fixed-shape positional arrays to typed records.
//!
//! ## Layouts
//!
//! ```text
//! feed    (5):  tag id size posX posY
//! player (24):  tag id size mdX mdY traction posX posY
//!               angPos angVel angAcc score
//!               v0x v0y v1x v1y v2x v2y
//!               nickname factionId factionName factionMembers factionCap factionScore
//! partial (8):  id size mdX mdY traction posX posY score
//! ```
//!
//! Length is checked before any field is read. A short or long record is an
//! [`WireError::Arity`] error, never a partial read.

use nebula_core::{
    Angular, EntityId, EntitySnapshot, Faction, FeedSnapshot, PartialUpdate, PlayerSnapshot, Vec2,
};
use serde_json::Value;

use crate::error::{WireError, WireResult};

/// Type tag for player snapshots.
pub const PLAYER_TAG: &str = "player";

/// Type tag for feed snapshots.
pub const FEED_TAG: &str = "feed";

/// Field names of the player layout, tag included.
pub const PLAYER_FIELDS: [&str; 24] = [
    "tag",
    "id",
    "size",
    "mdX",
    "mdY",
    "traction",
    "posX",
    "posY",
    "angPos",
    "angVel",
    "angAcc",
    "score",
    "v0x",
    "v0y",
    "v1x",
    "v1y",
    "v2x",
    "v2y",
    "nickname",
    "factionId",
    "factionName",
    "factionMembers",
    "factionCap",
    "factionScore",
];

/// Field names of the feed layout, tag included.
pub const FEED_FIELDS: [&str; 5] = ["tag", "id", "size", "posX", "posY"];

/// Field names of the partial update layout.
pub const PARTIAL_FIELDS: [&str; 8] = [
    "id", "size", "mdX", "mdY", "traction", "posX", "posY", "score",
];

/// Player layout arity.
pub const PLAYER_ARITY: usize = PLAYER_FIELDS.len();

/// Feed layout arity.
pub const FEED_ARITY: usize = FEED_FIELDS.len();

/// Partial update arity.
pub const PARTIAL_ARITY: usize = PARTIAL_FIELDS.len();

/// Arity-checked view over one record.
struct Fields<'a> {
    kind: &'static str,
    names: &'static [&'static str],
    values: &'a [Value],
}

impl<'a> Fields<'a> {
    fn new(kind: &'static str, names: &'static [&'static str], values: &'a [Value]) -> WireResult<Self> {
        if values.len() != names.len() {
            return Err(WireError::Arity {
                kind,
                expected: names.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            kind,
            names,
            values,
        })
    }

    fn name(&self, index: usize) -> &'static str {
        self.names.get(index).copied().unwrap_or("?")
    }

    fn value(&self, index: usize) -> WireResult<&'a Value> {
        self.values.get(index).ok_or(WireError::Arity {
            kind: self.kind,
            expected: self.names.len(),
            actual: self.values.len(),
        })
    }

    fn opt_f32(&self, index: usize) -> WireResult<Option<f32>> {
        match self.value(index)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(|v| Some(v as f32))
                .ok_or(WireError::InvalidField {
                    kind: self.kind,
                    field: self.name(index),
                }),
            _ => Err(self.invalid(index)),
        }
    }

    fn f32(&self, index: usize) -> WireResult<f32> {
        self.opt_f32(index)?.ok_or(WireError::MissingField {
            kind: self.kind,
            field: self.name(index),
        })
    }

    fn f32_or_zero(&self, index: usize) -> WireResult<f32> {
        Ok(self.opt_f32(index)?.unwrap_or(0.0))
    }

    fn opt_u64(&self, index: usize) -> WireResult<Option<u64>> {
        match self.value(index)? {
            Value::Null => Ok(None),
            value => whole_number(value).map(Some).ok_or_else(|| self.invalid(index)),
        }
    }

    fn id(&self, index: usize) -> WireResult<EntityId> {
        self.opt_u64(index)?
            .map(EntityId)
            .ok_or(WireError::MissingField {
                kind: self.kind,
                field: self.name(index),
            })
    }

    fn opt_string(&self, index: usize) -> WireResult<Option<String>> {
        match self.value(index)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            _ => Err(self.invalid(index)),
        }
    }

    fn vec2(&self, x: usize, y: usize) -> WireResult<Vec2> {
        Ok(Vec2::new(self.f32(x)?, self.f32(y)?))
    }

    fn vec2_or_zero(&self, x: usize, y: usize) -> WireResult<Vec2> {
        Ok(Vec2::new(self.f32_or_zero(x)?, self.f32_or_zero(y)?))
    }

    fn invalid(&self, index: usize) -> WireError {
        WireError::InvalidField {
            kind: self.kind,
            field: self.name(index),
        }
    }
}

/// Reads a non-negative whole number, written either as an integer or as a
/// float with no fractional part (`5` and `5.0` are the same id).
pub(crate) fn whole_number(value: &Value) -> Option<u64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(raw) = n.as_u64() {
        return Some(raw);
    }
    n.as_f64()
        .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64)
        .map(|v| v as u64)
}

/// Decodes a full entity snapshot.
///
/// The first field selects the layout.
///
/// # Errors
///
/// - [`WireError::UnknownKind`] for an unrecognised tag (recoverable warning)
/// - [`WireError::Arity`] if the field count does not match the layout
/// - [`WireError::MissingField`] / [`WireError::InvalidField`] for bad values
pub fn decode_snapshot(fields: &[Value]) -> WireResult<EntitySnapshot> {
    let tag = match fields.first() {
        Some(Value::String(tag)) => tag.as_str(),
        Some(other) => return Err(WireError::UnknownKind(other.to_string())),
        None => {
            return Err(WireError::Arity {
                kind: "snapshot",
                expected: 1,
                actual: 0,
            })
        }
    };

    match tag {
        PLAYER_TAG => decode_player(fields).map(EntitySnapshot::Player),
        FEED_TAG => decode_feed(fields).map(EntitySnapshot::Feed),
        other => Err(WireError::UnknownKind(other.to_string())),
    }
}

fn decode_feed(values: &[Value]) -> WireResult<FeedSnapshot> {
    let f = Fields::new(FEED_TAG, &FEED_FIELDS, values)?;
    Ok(FeedSnapshot {
        id: f.id(1)?,
        size: f.f32(2)?,
        position: f.vec2(3, 4)?,
    })
}

fn decode_player(values: &[Value]) -> WireResult<PlayerSnapshot> {
    let f = Fields::new(PLAYER_TAG, &PLAYER_FIELDS, values)?;

    let faction = match f.opt_u64(19)? {
        Some(id) => Some(Faction {
            id,
            name: f.opt_string(20)?.unwrap_or_default(),
            member_count: f.f32_or_zero(21)? as u32,
            member_cap: f.f32_or_zero(22)? as u32,
            score: f.f32_or_zero(23)?,
        }),
        None => None,
    };

    Ok(PlayerSnapshot {
        id: f.id(1)?,
        size: f.f32_or_zero(2)?,
        heading: f.vec2_or_zero(3, 4)?,
        traction: f.f32_or_zero(5)?.clamp(0.0, 1.0),
        position: f.vec2(6, 7)?,
        angular: Angular {
            pos: f.f32_or_zero(8)?,
            vel: f.f32_or_zero(9)?,
            acc: f.f32_or_zero(10)?,
        },
        score: f.f32_or_zero(11)?,
        vertices: vec![
            f.vec2_or_zero(12, 13)?,
            f.vec2_or_zero(14, 15)?,
            f.vec2_or_zero(16, 17)?,
        ],
        nickname: f.opt_string(18)?,
        faction,
    })
}

/// Decodes a partial update.
///
/// # Errors
///
/// Returns [`WireError::Arity`] unless exactly [`PARTIAL_ARITY`] fields are
/// present, or a field error for null / non-numeric values.
pub fn decode_partial_update(values: &[Value]) -> WireResult<PartialUpdate> {
    let f = Fields::new("partial", &PARTIAL_FIELDS, values)?;
    Ok(PartialUpdate {
        id: f.id(0)?,
        size: f.f32(1)?,
        heading: f.vec2(2, 3)?,
        traction: f.f32(4)?.clamp(0.0, 1.0),
        position: f.vec2(5, 6)?,
        score: f.f32(7)?,
    })
}

/// Encodes a feed snapshot in wire layout.
#[must_use]
pub fn encode_feed(feed: &FeedSnapshot) -> Vec<Value> {
    vec![
        Value::from(FEED_TAG),
        Value::from(feed.id.raw()),
        Value::from(feed.size),
        Value::from(feed.position.x),
        Value::from(feed.position.y),
    ]
}

/// Encodes a player snapshot in wire layout.
#[must_use]
pub fn encode_player(player: &PlayerSnapshot) -> Vec<Value> {
    let mut out = Vec::with_capacity(PLAYER_ARITY);
    out.push(Value::from(PLAYER_TAG));
    out.push(Value::from(player.id.raw()));
    out.push(Value::from(player.size));
    out.push(Value::from(player.heading.x));
    out.push(Value::from(player.heading.y));
    out.push(Value::from(player.traction));
    out.push(Value::from(player.position.x));
    out.push(Value::from(player.position.y));
    out.push(Value::from(player.angular.pos));
    out.push(Value::from(player.angular.vel));
    out.push(Value::from(player.angular.acc));
    out.push(Value::from(player.score));
    for i in 0..3 {
        let v = player.vertices.get(i).copied().unwrap_or_default();
        out.push(Value::from(v.x));
        out.push(Value::from(v.y));
    }
    out.push(player.nickname.clone().map_or(Value::Null, Value::from));
    match &player.faction {
        Some(faction) => {
            out.push(Value::from(faction.id));
            out.push(Value::from(faction.name.clone()));
            out.push(Value::from(faction.member_count));
            out.push(Value::from(faction.member_cap));
            out.push(Value::from(faction.score));
        }
        None => out.extend(std::iter::repeat(Value::Null).take(5)),
    }
    out
}

/// Encodes a partial update in wire layout.
#[must_use]
pub fn encode_partial_update(update: &PartialUpdate) -> Vec<Value> {
    vec![
        Value::from(update.id.raw()),
        Value::from(update.size),
        Value::from(update.heading.x),
        Value::from(update.heading.y),
        Value::from(update.traction),
        Value::from(update.position.x),
        Value::from(update.position.y),
        Value::from(update.score),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player_fields() -> Vec<Value> {
        let value = json!([
            "player", 7, 20.0, 0.6, 0.8, 1.0, 150.0, -40.0, 0.5, 0.0, 0.0, 12.0, 0.0, -10.0, 8.0,
            8.0, -8.0, 8.0, "ace", 3, "Red", 4, 10, 99.5
        ]);
        value.as_array().cloned().unwrap()
    }

    #[test]
    fn test_decode_feed() {
        let fields = json!(["feed", 5, 10.0, 100.0, 100.0]);
        let snap = decode_snapshot(fields.as_array().unwrap()).unwrap();
        match snap {
            EntitySnapshot::Feed(feed) => {
                assert_eq!(feed.id, EntityId(5));
                assert_eq!(feed.size, 10.0);
                assert_eq!(feed.position, Vec2::new(100.0, 100.0));
            }
            EntitySnapshot::Player(_) => panic!("expected feed"),
        }
    }

    #[test]
    fn test_decode_player() {
        let snap = decode_snapshot(&player_fields()).unwrap();
        let EntitySnapshot::Player(player) = snap else {
            panic!("expected player");
        };
        assert_eq!(player.id, EntityId(7));
        assert_eq!(player.position, Vec2::new(150.0, -40.0));
        assert_eq!(player.vertices.len(), 3);
        assert_eq!(player.vertices[0], Vec2::new(0.0, -10.0));
        assert_eq!(player.nickname.as_deref(), Some("ace"));
        let faction = player.faction.unwrap();
        assert_eq!(faction.id, 3);
        assert_eq!(faction.name, "Red");
        assert_eq!(faction.member_cap, 10);
    }

    #[test]
    fn test_player_without_faction() {
        let mut fields = player_fields();
        for value in &mut fields[18..] {
            *value = Value::Null;
        }
        let EntitySnapshot::Player(player) = decode_snapshot(&fields).unwrap() else {
            panic!("expected player");
        };
        assert!(player.faction.is_none());
        assert!(player.nickname.is_none());
    }

    #[test]
    fn test_short_record_is_arity_error() {
        let fields = json!(["feed", 5, 10.0, 100.0]);
        let err = decode_snapshot(fields.as_array().unwrap()).unwrap_err();
        assert_eq!(
            err,
            WireError::Arity {
                kind: "feed",
                expected: 5,
                actual: 4
            }
        );
        assert!(!err.is_warning());

        let mut short_player = player_fields();
        short_player.truncate(23);
        assert!(matches!(
            decode_snapshot(&short_player),
            Err(WireError::Arity { expected: 24, actual: 23, .. })
        ));
    }

    #[test]
    fn test_unknown_tag_is_warning() {
        let fields = json!(["asteroid", 1, 2.0]);
        let err = decode_snapshot(fields.as_array().unwrap()).unwrap_err();
        assert_eq!(err, WireError::UnknownKind("asteroid".to_string()));
        assert!(err.is_warning());
    }

    #[test]
    fn test_empty_record() {
        assert!(matches!(decode_snapshot(&[]), Err(WireError::Arity { .. })));
    }

    #[test]
    fn test_missing_feed_position() {
        let fields = json!(["feed", 5, 10.0, null, 100.0]);
        let err = decode_snapshot(fields.as_array().unwrap()).unwrap_err();
        assert_eq!(
            err,
            WireError::MissingField {
                kind: "feed",
                field: "posX"
            }
        );
    }

    #[test]
    fn test_player_without_id_is_missing_field() {
        let mut fields = player_fields();
        fields[1] = Value::Null;
        assert!(matches!(
            decode_snapshot(&fields),
            Err(WireError::MissingField { field: "id", .. })
        ));
    }

    #[test]
    fn test_decode_partial() {
        let fields = json!([7, 21.0, 0.0, 1.0, 0.5, 10.0, 20.0, 3.0]);
        let update = decode_partial_update(fields.as_array().unwrap()).unwrap();
        assert_eq!(update.id, EntityId(7));
        assert_eq!(update.heading, Vec2::new(0.0, 1.0));
        assert_eq!(update.position, Vec2::new(10.0, 20.0));

        let short = json!([7, 21.0, 0.0, 1.0, 0.5, 10.0, 20.0]);
        assert!(matches!(
            decode_partial_update(short.as_array().unwrap()),
            Err(WireError::Arity { expected: 8, actual: 7, .. })
        ));
    }

    #[test]
    fn test_string_in_numeric_slot() {
        let fields = json!(["feed", 5, "big", 1.0, 1.0]);
        assert!(matches!(
            decode_snapshot(fields.as_array().unwrap()),
            Err(WireError::InvalidField { field: "size", .. })
        ));
    }

    #[test]
    fn test_encoded_player_matches_layout() {
        let EntitySnapshot::Player(player) = decode_snapshot(&player_fields()).unwrap() else {
            panic!("expected player");
        };
        let encoded = encode_player(&player);
        assert_eq!(encoded.len(), PLAYER_ARITY);
        assert_eq!(decode_snapshot(&encoded).unwrap(), EntitySnapshot::Player(player));
    }
}
