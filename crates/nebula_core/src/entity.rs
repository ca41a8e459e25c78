//! # Entity Records
//!
//! What the client knows about each remote object.
//!
//! ## Lifecycle
//!
//! ```text
//! EntitySnapshot ──(added)──► Entity ◄──(changed)── PartialUpdate
//!                               │
//!                  (absent from current ids)
//!                               ▼
//!                            evicted
//! ```
//!
//! Only a full [`EntitySnapshot`] creates an [`Entity`]. A [`PartialUpdate`]
//! can only mutate one that already exists.

use crate::math::Vec2;

/// Server-assigned entity identifier, stable for the entity's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Creates a new entity id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw wire value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A ship controlled by a player.
    Player,
    /// A static pellet players collect.
    Feed,
}

impl EntityKind {
    /// Wire tag for this kind.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Feed => "feed",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Angular state of a player ship.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Angular {
    /// Angle.
    pub pos: f32,
    /// Angular velocity.
    pub vel: f32,
    /// Angular acceleration.
    pub acc: f32,
}

/// Faction membership reported alongside a player.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Faction {
    /// Faction id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Current member count.
    pub member_count: u32,
    /// Member limit.
    pub member_cap: u32,
    /// Faction score.
    pub score: f32,
}

/// Full state of a player ship.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Visual scale and collision size.
    pub size: f32,
    /// Hull geometry, relative to the ship origin.
    pub vertices: Vec<Vec2>,
    /// Normalised direction of intended motion (the "md" vector).
    pub heading: Vec2,
    /// Control intensity, 0..1.
    pub traction: f32,
    /// World position.
    pub position: Vec2,
    /// Angular state.
    pub angular: Angular,
    /// Score.
    pub score: f32,
    /// Nickname, if the server sent one.
    pub nickname: Option<String>,
    /// Faction membership.
    pub faction: Option<Faction>,
}

/// Full state of a feed pellet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeedSnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Visual scale and collision size.
    pub size: f32,
    /// World position.
    pub position: Vec2,
}

/// Full entity snapshot, one variant per kind.
#[derive(Clone, Debug, PartialEq)]
pub enum EntitySnapshot {
    /// A player ship.
    Player(PlayerSnapshot),
    /// A feed pellet.
    Feed(FeedSnapshot),
}

impl EntitySnapshot {
    /// Entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Player(p) => p.id,
            Self::Feed(f) => f.id,
        }
    }

    /// Entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Player(_) => EntityKind::Player,
            Self::Feed(_) => EntityKind::Feed,
        }
    }

    /// Size.
    #[must_use]
    pub fn size(&self) -> f32 {
        match self {
            Self::Player(p) => p.size,
            Self::Feed(f) => f.size,
        }
    }

    /// Position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        match self {
            Self::Player(p) => p.position,
            Self::Feed(f) => f.position,
        }
    }
}

/// High-frequency subset of entity state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartialUpdate {
    /// Entity id.
    pub id: EntityId,
    /// Size.
    pub size: f32,
    /// Heading.
    pub heading: Vec2,
    /// Traction.
    pub traction: f32,
    /// Authoritative position.
    pub position: Vec2,
    /// Score.
    pub score: f32,
}

/// Registry record for one entity.
///
/// `position` is the predicted position the view shows. `authoritative` is the
/// last position the server confirmed; prediction blends towards it.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Entity id.
    pub id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Size.
    pub size: f32,
    /// Heading.
    pub heading: Vec2,
    /// Traction.
    pub traction: f32,
    /// Predicted (displayed) position.
    pub position: Vec2,
    /// Last authoritative position.
    pub authoritative: Vec2,
    /// Score.
    pub score: f32,
    /// Hull geometry (players only).
    pub vertices: Vec<Vec2>,
    /// Angular state (players only).
    pub angular: Angular,
    /// Nickname (players only).
    pub nickname: Option<String>,
    /// Faction membership (players only).
    pub faction: Option<Faction>,
    /// True for the entity driven by local input.
    pub is_local: bool,
}

impl Entity {
    /// Builds a record from a full snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &EntitySnapshot) -> Self {
        match snapshot {
            EntitySnapshot::Player(p) => Self {
                id: p.id,
                kind: EntityKind::Player,
                size: p.size,
                heading: p.heading,
                traction: p.traction,
                position: p.position,
                authoritative: p.position,
                score: p.score,
                vertices: p.vertices.clone(),
                angular: p.angular,
                nickname: p.nickname.clone(),
                faction: p.faction.clone(),
                is_local: false,
            },
            EntitySnapshot::Feed(f) => Self {
                id: f.id,
                kind: EntityKind::Feed,
                size: f.size,
                heading: Vec2::ZERO,
                traction: 0.0,
                position: f.position,
                authoritative: f.position,
                score: 0.0,
                vertices: Vec::new(),
                angular: Angular::default(),
                nickname: None,
                faction: None,
                is_local: false,
            },
        }
    }

    /// Half of the entity's size, used to inset world bounds.
    #[inline]
    #[must_use]
    pub fn half_extent(&self) -> f32 {
        self.size * 0.5
    }

    /// Merges a partial update.
    ///
    /// With `take_position == false` the authoritative anchor is left alone.
    pub fn apply_update(&mut self, update: &PartialUpdate, take_position: bool) {
        self.size = update.size;
        self.heading = update.heading;
        self.traction = update.traction;
        self.score = update.score;
        if take_position {
            self.authoritative = update.position;
        }
    }

    /// Refreshes descriptive fields from a later full snapshot.
    ///
    /// Positions are never touched here.
    pub fn refresh_from_snapshot(&mut self, snapshot: &EntitySnapshot) {
        self.size = snapshot.size();
        if let EntitySnapshot::Player(p) = snapshot {
            self.vertices.clone_from(&p.vertices);
            self.angular = p.angular;
            self.score = p.score;
            self.nickname.clone_from(&p.nickname);
            self.faction.clone_from(&p.faction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(id: u64) -> EntitySnapshot {
        EntitySnapshot::Feed(FeedSnapshot {
            id: EntityId(id),
            size: 10.0,
            position: Vec2::new(100.0, 100.0),
        })
    }

    #[test]
    fn test_feed_record_defaults() {
        let entity = Entity::from_snapshot(&feed(5));
        assert_eq!(entity.kind, EntityKind::Feed);
        assert_eq!(entity.position, entity.authoritative);
        assert_eq!(entity.traction, 0.0);
        assert!(!entity.is_local);
        assert_eq!(entity.half_extent(), 5.0);
    }

    #[test]
    fn test_apply_update_keeps_anchor_when_asked() {
        let mut entity = Entity::from_snapshot(&feed(1));
        let update = PartialUpdate {
            id: EntityId(1),
            size: 12.0,
            heading: Vec2::new(1.0, 0.0),
            traction: 0.5,
            position: Vec2::new(500.0, 500.0),
            score: 3.0,
        };

        entity.apply_update(&update, false);
        assert_eq!(entity.size, 12.0);
        assert_eq!(entity.authoritative, Vec2::new(100.0, 100.0));

        entity.apply_update(&update, true);
        assert_eq!(entity.authoritative, Vec2::new(500.0, 500.0));
        // Predicted position is only moved by the predictor.
        assert_eq!(entity.position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_snapshot_accessors() {
        let snap = feed(9);
        assert_eq!(snap.id(), EntityId(9));
        assert_eq!(snap.kind(), EntityKind::Feed);
        assert_eq!(snap.kind().tag(), "feed");
    }
}
