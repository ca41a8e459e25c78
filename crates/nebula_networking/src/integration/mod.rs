//! # Integration Layer
//!
//! Everything the sync core needs from the outside world, and the
//! bookkeeping that ties entities to views.
//!
//! ```text
//! EntityRegistry ──id──▶ ViewSet ──handle──▶ ViewBinder (backend)
//! SyncClient ─────────────────────────────▶ Transport (backend)
//! ```

pub mod traits;

pub use traits::*;

use std::collections::HashMap;

use nebula_core::{Entity, EntityId, Vec2};

/// View handles keyed by entity id.
///
/// Guarantees at most one view per entity and exactly one destroy per view.
#[derive(Debug)]
pub struct ViewSet<V: ViewBinder> {
    binder: V,
    handles: HashMap<EntityId, V::Handle>,
}

impl<V: ViewBinder> ViewSet<V> {
    /// Wraps a binder.
    #[must_use]
    pub fn new(binder: V) -> Self {
        Self {
            binder,
            handles: HashMap::new(),
        }
    }

    /// Creates the view of an entity unless it already has one.
    ///
    /// Returns true if a view was created.
    pub fn create(&mut self, entity: &Entity) -> bool {
        if self.handles.contains_key(&entity.id) {
            return false;
        }
        let handle = self.binder.create_view(entity.kind, entity);
        self.binder.set_scale(handle, entity.size);
        self.binder.set_position(handle, entity.position);
        self.handles.insert(entity.id, handle);
        true
    }

    /// Destroys the view of an entity. Returns false if it had none.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        match self.handles.remove(&id) {
            Some(handle) => {
                self.binder.destroy_view(handle);
                true
            }
            None => false,
        }
    }

    /// Pushes a position to an entity's view.
    pub fn set_position(&mut self, id: EntityId, position: Vec2) {
        if let Some(&handle) = self.handles.get(&id) {
            self.binder.set_position(handle, position);
        }
    }

    /// Pushes a rotation to an entity's view.
    pub fn set_rotation(&mut self, id: EntityId, degrees: f32) {
        if let Some(&handle) = self.handles.get(&id) {
            self.binder.set_rotation(handle, degrees);
        }
    }

    /// Pushes a scale to an entity's view.
    pub fn set_scale(&mut self, id: EntityId, scale: f32) {
        if let Some(&handle) = self.handles.get(&id) {
            self.binder.set_scale(handle, scale);
        }
    }

    /// Handle of an entity's view.
    #[must_use]
    pub fn handle(&self, id: EntityId) -> Option<V::Handle> {
        self.handles.get(&id).copied()
    }

    /// Number of live views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no view is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// The wrapped binder.
    #[must_use]
    pub const fn binder(&self) -> &V {
        &self.binder
    }

    /// The wrapped binder, mutably.
    pub fn binder_mut(&mut self) -> &mut V {
        &mut self.binder
    }
}
