//! # Tick Reconciliation
//!
//! Applies one authoritative tick to the registry and keeps views in step.
//!
//! ## Ordering
//!
//! ```text
//! 1. added    → bind local / registry.add / create view
//! 2. changed  → registry.apply_update / rescale view
//! 3. current  → registry.reconcile / destroy view (once per entity)
//! ```
//!
//! Eviction runs last so an entity added and confirmed in the same tick is
//! never dropped.

use nebula_core::{Entity, EntityId, EntitySnapshot};

use crate::integration::{ViewBinder, ViewSet};
use crate::protocol::WorldTick;
use crate::registry::{EntityRegistry, UpdateOutcome};

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// New entities created.
    pub added: usize,
    /// Adds ignored because the id already existed.
    pub duplicates: usize,
    /// True if the tick carried the local player's snapshot.
    pub local_bound: bool,
    /// Partial updates merged.
    pub updated: usize,
    /// Partial updates for unknown ids.
    pub unknown_ids: usize,
    /// Players-only updates that named a non-player entity.
    pub wrong_kind: usize,
    /// Entities evicted, sorted by id.
    pub evicted: Vec<EntityId>,
}

/// Registry plus view bindings, driven tick by tick.
#[derive(Debug)]
pub struct ReconciliationEngine<V: ViewBinder> {
    registry: EntityRegistry,
    views: ViewSet<V>,
}

impl<V: ViewBinder> ReconciliationEngine<V> {
    /// Creates an engine with an empty registry.
    #[must_use]
    pub fn new(binder: V) -> Self {
        Self {
            registry: EntityRegistry::new(),
            views: ViewSet::new(binder),
        }
    }

    /// Applies a tick in add → change → evict order.
    pub fn apply_tick(&mut self, tick: &WorldTick) -> TickReport {
        let mut report = TickReport::default();

        for snapshot in &tick.added {
            if Some(snapshot.id()) == self.registry.local_player_id() {
                self.bind_local(snapshot);
                report.local_bound = true;
            } else if self.registry.add(snapshot) {
                if let Some(entity) = self.registry.get(snapshot.id()) {
                    self.views.create(entity);
                }
                report.added += 1;
            } else {
                report.duplicates += 1;
            }
        }

        for update in &tick.changed {
            let size_before = self.registry.get(update.id).map(|e| e.size);
            let outcome = if tick.players_only {
                self.registry.apply_player_update(update)
            } else {
                self.registry.apply_update(update)
            };
            match outcome {
                UpdateOutcome::Applied | UpdateOutcome::AppliedLocal => {
                    report.updated += 1;
                    if size_before != Some(update.size) {
                        self.views.set_scale(update.id, update.size);
                    }
                }
                UpdateOutcome::UnknownId => report.unknown_ids += 1,
                UpdateOutcome::WrongKind => report.wrong_kind += 1,
            }
        }

        if let Some(current) = &tick.current_ids {
            for entity in self.registry.reconcile(current) {
                self.views.destroy(entity.id);
                report.evicted.push(entity.id);
            }
        }

        report
    }

    /// Binds a full snapshot to the local player, creating its view on first
    /// sight. Returns true if the entity was created.
    pub fn bind_local(&mut self, snapshot: &EntitySnapshot) -> bool {
        let created = self.registry.bind_local(snapshot);
        if let Some(entity) = self.registry.local_player() {
            if created {
                self.views.create(entity);
            } else {
                self.views.set_scale(entity.id, entity.size);
            }
        }
        created
    }

    /// Declares the local player id.
    pub fn set_local_player_id(&mut self, id: Option<EntityId>) {
        self.registry.set_local_player_id(id);
    }

    /// Drops every entity and destroys every view.
    pub fn clear(&mut self) -> Vec<Entity> {
        let removed = self.registry.clear();
        for entity in &removed {
            self.views.destroy(entity.id);
        }
        removed
    }

    /// The registry.
    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// The view bindings.
    #[must_use]
    pub const fn views(&self) -> &ViewSet<V> {
        &self.views
    }

    /// Registry and views, both mutable, for the per-frame pass.
    pub fn parts_mut(&mut self) -> (&mut EntityRegistry, &mut ViewSet<V>) {
        (&mut self.registry, &mut self.views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::{RecordingViews, ViewCall};
    use nebula_core::{FeedSnapshot, PartialUpdate, Vec2};
    use std::collections::HashSet;

    fn feed(id: u64, x: f32, y: f32) -> EntitySnapshot {
        EntitySnapshot::Feed(FeedSnapshot {
            id: EntityId(id),
            size: 10.0,
            position: Vec2::new(x, y),
        })
    }

    fn ids(raw: &[u64]) -> Option<HashSet<EntityId>> {
        Some(raw.iter().copied().map(EntityId).collect())
    }

    #[test]
    fn test_add_and_confirm_same_tick() {
        let mut engine = ReconciliationEngine::new(RecordingViews::lifecycle_only());
        let report = engine.apply_tick(&WorldTick {
            added: vec![feed(1, 0.0, 0.0), feed(2, 5.0, 5.0)],
            changed: vec![],
            current_ids: ids(&[1, 2]),
            ..WorldTick::default()
        });
        assert_eq!(report.added, 2);
        assert!(report.evicted.is_empty());
        assert_eq!(engine.registry().len(), 2);
        assert_eq!(engine.views().len(), 2);
    }

    #[test]
    fn test_evicted_view_destroyed_once() {
        let mut engine = ReconciliationEngine::new(RecordingViews::lifecycle_only());
        engine.apply_tick(&WorldTick {
            added: vec![feed(5, 100.0, 100.0)],
            ..WorldTick::default()
        });
        let handle = engine.views().handle(EntityId(5)).unwrap();

        let report = engine.apply_tick(&WorldTick {
            current_ids: ids(&[]),
            ..WorldTick::default()
        });
        assert_eq!(report.evicted, vec![EntityId(5)]);
        // A second omission has nothing left to destroy.
        engine.apply_tick(&WorldTick {
            current_ids: ids(&[]),
            ..WorldTick::default()
        });
        assert!(!engine.registry().contains(EntityId(5)));
        assert_eq!(engine.views().binder().destroy_count(handle), 1);
    }

    #[test]
    fn test_missing_current_does_not_evict() {
        let mut engine = ReconciliationEngine::new(RecordingViews::lifecycle_only());
        engine.apply_tick(&WorldTick {
            added: vec![feed(1, 0.0, 0.0)],
            ..WorldTick::default()
        });
        let report = engine.apply_tick(&WorldTick::default());
        assert!(report.evicted.is_empty());
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn test_local_snapshot_binds_instead_of_duplicating() {
        let mut engine = ReconciliationEngine::new(RecordingViews::lifecycle_only());
        engine.set_local_player_id(Some(EntityId(9)));
        engine.apply_tick(&WorldTick {
            added: vec![feed(9, 1.0, 1.0)],
            ..WorldTick::default()
        });
        let report = engine.apply_tick(&WorldTick {
            added: vec![feed(9, 50.0, 50.0)],
            ..WorldTick::default()
        });
        assert!(report.local_bound);
        assert_eq!(report.duplicates, 0);
        assert_eq!(engine.views().len(), 1);
        assert_eq!(engine.registry().local_player().unwrap().position, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_size_change_rescales() {
        let mut engine = ReconciliationEngine::new(RecordingViews::lifecycle_only());
        engine.apply_tick(&WorldTick {
            added: vec![feed(1, 0.0, 0.0)],
            ..WorldTick::default()
        });
        let handle = engine.views().handle(EntityId(1)).unwrap();
        let report = engine.apply_tick(&WorldTick {
            changed: vec![
                PartialUpdate {
                    id: EntityId(1),
                    size: 25.0,
                    heading: Vec2::ZERO,
                    traction: 0.0,
                    position: Vec2::ZERO,
                    score: 0.0,
                },
                PartialUpdate {
                    id: EntityId(77),
                    size: 1.0,
                    heading: Vec2::ZERO,
                    traction: 0.0,
                    position: Vec2::ZERO,
                    score: 0.0,
                },
            ],
            ..WorldTick::default()
        });
        assert_eq!(report.updated, 1);
        assert_eq!(report.unknown_ids, 1);
        assert_eq!(
            engine.views().binder().calls().last(),
            Some(&ViewCall::Scale(handle, 25.0))
        );
    }

    #[test]
    fn test_clear_destroys_everything() {
        let mut engine = ReconciliationEngine::new(RecordingViews::lifecycle_only());
        engine.apply_tick(&WorldTick {
            added: vec![feed(1, 0.0, 0.0), feed(2, 0.0, 0.0)],
            ..WorldTick::default()
        });
        assert_eq!(engine.clear().len(), 2);
        assert_eq!(engine.views().binder().live(), 0);
        assert!(engine.views().is_empty());
    }
}
