//! # Integration Traits
//!
//! Seams to the presentation layer and the transport.
//!
//! The sync core never draws and never opens sockets. It calls these traits;
//! each backend implements them once.
//!
//! ```text
//! sync core calls:        backend implements:
//! ┌────────────────┐      ┌────────────────┐
//! │ ViewBinder     │ ←─── │ impl for scene │
//! │ Transport      │ ←─── │ impl for socket│
//! └────────────────┘      └────────────────┘
//! ```

use nebula_core::{Entity, EntityKind, Vec2};
use serde_json::Value;

// ============================================================================
// PRESENTATION
// ============================================================================

/// Binding between entities and their on-screen representation.
pub trait ViewBinder {
    /// Opaque view handle.
    type Handle: Copy + Eq + std::fmt::Debug;

    /// Creates the view of a newly registered entity.
    fn create_view(&mut self, kind: EntityKind, entity: &Entity) -> Self::Handle;

    /// Tears down a view. Called exactly once per created handle.
    fn destroy_view(&mut self, handle: Self::Handle);

    /// Moves a view.
    fn set_position(&mut self, handle: Self::Handle, position: Vec2);

    /// Rotates a view (degrees).
    fn set_rotation(&mut self, handle: Self::Handle, degrees: f32);

    /// Rescales a view to the entity size.
    fn set_scale(&mut self, handle: Self::Handle, scale: f32);
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// Outbound half of the session transport.
///
/// Inbound messages arrive through the client's queue instead.
pub trait Transport {
    /// Sends one event.
    fn emit(&mut self, event: &str, payload: Value);
}

// ============================================================================
// RECORDING IMPLEMENTATIONS (For Testing)
// ============================================================================

/// Handle issued by [`RecordingViews`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub u32);

/// One call made on [`RecordingViews`].
#[derive(Clone, Debug, PartialEq)]
pub enum ViewCall {
    /// `create_view`.
    Create {
        /// Issued handle.
        handle: ViewHandle,
        /// Entity kind.
        kind: EntityKind,
        /// Raw entity id.
        entity: u64,
    },
    /// `destroy_view`.
    Destroy(ViewHandle),
    /// `set_position`.
    Position(ViewHandle, Vec2),
    /// `set_rotation`.
    Rotation(ViewHandle, f32),
    /// `set_scale`.
    Scale(ViewHandle, f32),
}

/// View binder that records every call.
#[derive(Debug, Default)]
pub struct RecordingViews {
    calls: Vec<ViewCall>,
    next_handle: u32,
    live: usize,
    record_frames: bool,
}

impl RecordingViews {
    /// Records every call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            record_frames: true,
            ..Self::default()
        }
    }

    /// Records only create/destroy/scale, skipping per-frame position and
    /// rotation calls.
    #[must_use]
    pub fn lifecycle_only() -> Self {
        Self::default()
    }

    /// All recorded calls.
    #[must_use]
    pub fn calls(&self) -> &[ViewCall] {
        &self.calls
    }

    /// Drains the recorded calls.
    pub fn take_calls(&mut self) -> Vec<ViewCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of views created and not yet destroyed.
    #[must_use]
    pub const fn live(&self) -> usize {
        self.live
    }

    /// Destroy calls recorded for `handle`.
    #[must_use]
    pub fn destroy_count(&self, handle: ViewHandle) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ViewCall::Destroy(h) if *h == handle))
            .count()
    }

    /// Handle created for a raw entity id, if any.
    #[must_use]
    pub fn handle_of(&self, entity: u64) -> Option<ViewHandle> {
        self.calls.iter().rev().find_map(|c| match c {
            ViewCall::Create {
                handle, entity: e, ..
            } if *e == entity => Some(*handle),
            _ => None,
        })
    }
}

impl ViewBinder for RecordingViews {
    type Handle = ViewHandle;

    fn create_view(&mut self, kind: EntityKind, entity: &Entity) -> ViewHandle {
        let handle = ViewHandle(self.next_handle);
        self.next_handle += 1;
        self.live += 1;
        self.calls.push(ViewCall::Create {
            handle,
            kind,
            entity: entity.id.raw(),
        });
        handle
    }

    fn destroy_view(&mut self, handle: ViewHandle) {
        self.live = self.live.saturating_sub(1);
        self.calls.push(ViewCall::Destroy(handle));
    }

    fn set_position(&mut self, handle: ViewHandle, position: Vec2) {
        if self.record_frames {
            self.calls.push(ViewCall::Position(handle, position));
        }
    }

    fn set_rotation(&mut self, handle: ViewHandle, degrees: f32) {
        if self.record_frames {
            self.calls.push(ViewCall::Rotation(handle, degrees));
        }
    }

    fn set_scale(&mut self, handle: ViewHandle, scale: f32) {
        self.calls.push(ViewCall::Scale(handle, scale));
    }
}

/// Transport that records every emitted event.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Vec<(String, Value)>,
}

impl RecordingTransport {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far.
    #[must_use]
    pub fn sent(&self) -> &[(String, Value)] {
        &self.sent
    }

    /// Payloads emitted under `event`.
    #[must_use]
    pub fn payloads(&self, event: &str) -> Vec<&Value> {
        self.sent
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload)
            .collect()
    }

    /// Drains the record.
    pub fn take(&mut self) -> Vec<(String, Value)> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for RecordingTransport {
    fn emit(&mut self, event: &str, payload: Value) {
        self.sent.push((event.to_string(), payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{EntityId, EntitySnapshot, FeedSnapshot};

    #[test]
    fn test_recording_views_tracks_live() {
        let entity = Entity::from_snapshot(&EntitySnapshot::Feed(FeedSnapshot {
            id: EntityId(5),
            size: 10.0,
            position: Vec2::ZERO,
        }));
        let mut views = RecordingViews::lifecycle_only();
        let handle = views.create_view(EntityKind::Feed, &entity);
        views.set_position(handle, Vec2::new(1.0, 1.0));
        assert_eq!(views.live(), 1);
        assert_eq!(views.handle_of(5), Some(handle));

        views.destroy_view(handle);
        assert_eq!(views.live(), 0);
        assert_eq!(views.destroy_count(handle), 1);
        // Position calls are skipped in lifecycle-only mode.
        assert_eq!(views.calls().len(), 2);
    }

    #[test]
    fn test_recording_transport() {
        let mut transport = RecordingTransport::new();
        transport.emit("player.move", serde_json::json!([1.0, 0.0, 0.5]));
        assert_eq!(transport.payloads("player.move").len(), 1);
        assert!(transport.payloads("player.other").is_empty());
    }
}
