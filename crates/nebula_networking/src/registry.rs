//! # Entity Registry
//!
//! Owns the mapping from entity id to entity state.
//!
//! ## Invariants
//!
//! - Ids are unique. Adding a known id is a no-op, the first snapshot wins.
//! - Only full snapshots create entities; partial updates for unknown ids are
//!   dropped with a warning.
//! - At most one entity is flagged local. It takes authoritative positions
//!   softly, through the predictor, never from partial updates.
//!
//! The registry lives for one session and is rebuilt from scratch on re-join.

use std::collections::{HashMap, HashSet};

use nebula_core::{Entity, EntityId, EntityKind, EntitySnapshot, PartialUpdate};

/// What happened to a partial update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Merged into a remote entity, including its position anchor.
    Applied,
    /// Merged into the local player, position left alone.
    AppliedLocal,
    /// No entity with that id.
    UnknownId,
    /// The entity exists but is not of the kind the batch may touch.
    WrongKind,
}

/// Registry of every entity the client currently knows about.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// Entities by id.
    entities: HashMap<EntityId, Entity>,
    /// Id of the entity driven by local input.
    local_player: Option<EntityId>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares which id belongs to the local player.
    ///
    /// An already registered entity with that id is flagged immediately.
    pub fn set_local_player_id(&mut self, id: Option<EntityId>) {
        if let Some(old) = self.local_player.and_then(|old| self.entities.get_mut(&old)) {
            old.is_local = false;
        }
        self.local_player = id;
        if let Some(entity) = id.and_then(|id| self.entities.get_mut(&id)) {
            entity.is_local = true;
        }
    }

    /// Id of the local player, if one is set.
    #[inline]
    #[must_use]
    pub const fn local_player_id(&self) -> Option<EntityId> {
        self.local_player
    }

    /// The local player entity, if registered.
    #[must_use]
    pub fn local_player(&self) -> Option<&Entity> {
        self.local_player.and_then(|id| self.entities.get(&id))
    }

    /// Mutable access to the local player entity.
    pub fn local_player_mut(&mut self) -> Option<&mut Entity> {
        self.local_player.and_then(|id| self.entities.get_mut(&id))
    }

    /// Inserts a new entity.
    ///
    /// Returns false, without touching anything, if the id already exists.
    pub fn add(&mut self, snapshot: &EntitySnapshot) -> bool {
        let id = snapshot.id();
        if self.entities.contains_key(&id) {
            tracing::debug!("Duplicate add ignored for {}", id);
            return false;
        }
        let mut entity = Entity::from_snapshot(snapshot);
        entity.is_local = self.local_player == Some(id);
        self.entities.insert(id, entity);
        true
    }

    /// Binds a full snapshot to the local player.
    ///
    /// Creates the local entity on first sight; afterwards only descriptive
    /// fields are refreshed, the predicted position is kept. Returns true if
    /// the entity was created.
    pub fn bind_local(&mut self, snapshot: &EntitySnapshot) -> bool {
        let id = snapshot.id();
        self.set_local_player_id(Some(id));
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.refresh_from_snapshot(snapshot);
            return false;
        }
        let mut entity = Entity::from_snapshot(snapshot);
        entity.is_local = true;
        self.entities.insert(id, entity);
        true
    }

    /// Merges a partial update into an existing entity.
    ///
    /// The local player keeps its position; everything else is merged.
    pub fn apply_update(&mut self, update: &PartialUpdate) -> UpdateOutcome {
        let Some(entity) = self.entities.get_mut(&update.id) else {
            tracing::warn!("Update for unknown entity {} dropped", update.id);
            return UpdateOutcome::UnknownId;
        };
        if entity.is_local {
            entity.apply_update(update, false);
            UpdateOutcome::AppliedLocal
        } else {
            entity.apply_update(update, true);
            UpdateOutcome::Applied
        }
    }

    /// Merges an update from a players-only batch.
    ///
    /// Updates that name a non-player entity are dropped with a warning.
    pub fn apply_player_update(&mut self, update: &PartialUpdate) -> UpdateOutcome {
        match self.entities.get(&update.id).map(|e| e.kind) {
            Some(kind) if kind != EntityKind::Player => {
                tracing::warn!("Player update for {} entity {} dropped", kind, update.id);
                UpdateOutcome::WrongKind
            }
            _ => self.apply_update(update),
        }
    }

    /// Removes every entity whose id is not in `current_ids`.
    ///
    /// Must run after all adds and updates of the same tick. Removed entities
    /// are returned sorted by id for view teardown.
    pub fn reconcile(&mut self, current_ids: &HashSet<EntityId>) -> Vec<Entity> {
        let stale: Vec<EntityId> = self
            .entities
            .keys()
            .filter(|id| !current_ids.contains(id))
            .copied()
            .collect();

        let mut removed: Vec<Entity> = stale
            .into_iter()
            .filter_map(|id| self.entities.remove(&id))
            .collect();
        removed.sort_by_key(|e| e.id);

        for entity in &removed {
            tracing::debug!("Evicted {} ({})", entity.id, entity.kind);
        }
        removed
    }

    /// Removes every entity and forgets the local player.
    pub fn clear(&mut self) -> Vec<Entity> {
        self.local_player = None;
        let mut removed: Vec<Entity> = self.entities.drain().map(|(_, e)| e).collect();
        removed.sort_by_key(|e| e.id);
        removed
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Looks up an entity mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Returns true if the id is registered.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Iterates over all entities in no particular order.
    pub fn all(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Iterates mutably over all entities.
    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Sorted list of registered ids.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{FeedSnapshot, Vec2};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn feed(id: u64, x: f32) -> EntitySnapshot {
        EntitySnapshot::Feed(FeedSnapshot {
            id: EntityId(id),
            size: 10.0,
            position: Vec2::new(x, 0.0),
        })
    }

    fn update(id: u64, x: f32) -> PartialUpdate {
        PartialUpdate {
            id: EntityId(id),
            size: 14.0,
            heading: Vec2::new(1.0, 0.0),
            traction: 1.0,
            position: Vec2::new(x, 0.0),
            score: 1.0,
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = EntityRegistry::new();
        assert!(registry.add(&feed(1, 10.0)));
        assert!(!registry.add(&feed(1, 99.0)));
        assert_eq!(registry.len(), 1);
        // First snapshot wins.
        assert_eq!(registry.get(EntityId(1)).unwrap().position.x, 10.0);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut registry = EntityRegistry::new();
        assert_eq!(registry.apply_update(&update(3, 1.0)), UpdateOutcome::UnknownId);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_moves_anchor_not_position() {
        let mut registry = EntityRegistry::new();
        registry.add(&feed(1, 10.0));
        assert_eq!(registry.apply_update(&update(1, 50.0)), UpdateOutcome::Applied);
        let entity = registry.get(EntityId(1)).unwrap();
        assert_eq!(entity.authoritative.x, 50.0);
        assert_eq!(entity.position.x, 10.0);
        assert_eq!(entity.size, 14.0);
    }

    #[test]
    fn test_player_update_skips_feeds() {
        let mut registry = EntityRegistry::new();
        registry.add(&feed(1, 10.0));
        assert_eq!(registry.apply_player_update(&update(1, 50.0)), UpdateOutcome::WrongKind);
        let entity = registry.get(EntityId(1)).unwrap();
        assert_eq!(entity.authoritative.x, 10.0);
        assert_eq!(entity.size, 10.0);
        assert_eq!(registry.apply_player_update(&update(2, 0.0)), UpdateOutcome::UnknownId);
    }

    #[test]
    fn test_local_player_position_not_overwritten() {
        let mut registry = EntityRegistry::new();
        registry.set_local_player_id(Some(EntityId(7)));
        registry.add(&feed(7, 10.0));
        assert!(registry.get(EntityId(7)).unwrap().is_local);

        assert_eq!(registry.apply_update(&update(7, 500.0)), UpdateOutcome::AppliedLocal);
        let me = registry.local_player().unwrap();
        assert_eq!(me.authoritative.x, 10.0);
        assert_eq!(me.size, 14.0);
    }

    #[test]
    fn test_bind_local_keeps_position() {
        let mut registry = EntityRegistry::new();
        assert!(registry.bind_local(&feed(7, 10.0)));
        registry.local_player_mut().unwrap().position = Vec2::new(42.0, 0.0);
        assert!(!registry.bind_local(&feed(7, 99.0)));
        assert_eq!(registry.local_player().unwrap().position.x, 42.0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reconcile_returns_removed() {
        let mut registry = EntityRegistry::new();
        for id in 1..=4 {
            registry.add(&feed(id, 0.0));
        }
        let current: HashSet<EntityId> = [EntityId(2), EntityId(4), EntityId(9)].into_iter().collect();
        let removed = registry.reconcile(&current);
        let removed_ids: Vec<EntityId> = removed.iter().map(|e| e.id).collect();
        assert_eq!(removed_ids, vec![EntityId(1), EntityId(3)]);
        assert_eq!(registry.ids(), vec![EntityId(2), EntityId(4)]);
    }

    #[test]
    fn test_reconcile_closure_randomized() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let mut registry = EntityRegistry::new();
            let mut added = HashSet::new();
            for _ in 0..rng.gen_range(0..30) {
                let id = rng.gen_range(0..40u64);
                registry.add(&feed(id, 0.0));
                added.insert(EntityId(id));
                if rng.gen_bool(0.3) {
                    registry.apply_update(&update(rng.gen_range(0..40u64), 1.0));
                }
            }
            let current: HashSet<EntityId> = (0..rng.gen_range(0..30))
                .map(|_| EntityId(rng.gen_range(0..40u64)))
                .collect();

            registry.reconcile(&current);

            let mut expected: Vec<EntityId> = added.intersection(&current).copied().collect();
            expected.sort_unstable();
            assert_eq!(registry.ids(), expected);
        }
    }

    #[test]
    fn test_clear_forgets_local() {
        let mut registry = EntityRegistry::new();
        registry.bind_local(&feed(7, 0.0));
        registry.add(&feed(8, 0.0));
        assert_eq!(registry.clear().len(), 2);
        assert!(registry.local_player_id().is_none());
    }
}
