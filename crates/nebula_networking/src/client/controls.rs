//! Pointer to control vector.
//!
//! The player steers toward the pointer. Distance from the screen centre
//! sets traction, saturating at a live radius that is a fraction of the
//! largest circle fitting the screen.

use nebula_core::{heading_degrees, Vec2};

use crate::protocol::MoveCommand;

/// Heading and traction derived from input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlVector {
    /// Unit direction, or zero when the pointer sits on the centre.
    pub heading: Vec2,
    /// Intensity in 0..=1.
    pub traction: f32,
}

impl ControlVector {
    /// Builds a control vector from raw values, normalising the heading and
    /// clamping traction.
    #[must_use]
    pub fn new(heading: Vec2, traction: f32) -> Self {
        let traction = if traction.is_finite() {
            traction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            heading: heading.normalize_or_zero(),
            traction,
        }
    }

    /// Control vector for a pointer at `pointer` on a screen of size `screen`.
    #[must_use]
    pub fn from_pointer(pointer: Vec2, screen: Vec2, live_area_ratio: f32) -> Self {
        let center = screen * 0.5;
        let offset = pointer - center;
        let live_radius = screen.x.min(screen.y) * 0.5 * live_area_ratio;
        let traction = if live_radius > 0.0 {
            offset.length().min(live_radius) / live_radius
        } else {
            0.0
        };
        Self::new(offset, traction)
    }

    /// Heading angle in degrees, in (-180, 180].
    #[must_use]
    pub fn rotation_degrees(&self) -> f32 {
        heading_degrees(self.heading)
    }

    /// Wire form of this control vector.
    #[must_use]
    pub const fn to_command(self) -> MoveCommand {
        MoveCommand {
            heading: self.heading,
            traction: self.traction,
        }
    }
}
