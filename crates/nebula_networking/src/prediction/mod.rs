//! # Client-Side Prediction
//!
//! Dead reckoning between authoritative updates.
//!
//! ## How It Works
//!
//! 1. Server sends heading + traction + position at a few Hz
//! 2. Every frame each entity is pushed along its heading at the calibrated speed
//! 3. The predicted position is blended toward the last authoritative anchor
//! 4. The result is clamped into the world, inset by half the entity size
//!
//! ```text
//! anchor (server) ●
//!                  ╲  1/divisor of the gap per frame
//!                   ╲
//! predicted ○───────▶○  speed · dt · heading · traction
//! ```
//!
//! The local player uses a fixed divisor (soft, its input is authoritative
//! enough). Remote entities use a divisor that shrinks as the deviation grows,
//! so large errors are pulled back fast and small ones drift naturally.

mod velocity;

pub use velocity::{SampleRejection, VelocityEstimator};

use nebula_core::{Entity, Vec2, WorldBounds};

use crate::config::SyncConfig;

/// Deviations below this are treated as zero when picking a remote divisor.
const MIN_DEVIATION: f32 = 1e-4;

/// Motion state of one entity for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionState {
    /// Current predicted position.
    pub position: Vec2,
    /// Last authoritative position.
    pub anchor: Vec2,
    /// Unit heading (or zero).
    pub heading: Vec2,
    /// Control intensity, 0..1.
    pub traction: f32,
    /// Half of the entity's size.
    pub half_extent: f32,
}

impl MotionState {
    /// Reads the motion state of an entity.
    #[must_use]
    pub fn of(entity: &Entity) -> Self {
        Self {
            position: entity.position,
            anchor: entity.authoritative,
            heading: entity.heading,
            traction: entity.traction,
            half_extent: entity.half_extent(),
        }
    }
}

/// Per-frame position extrapolation.
#[derive(Clone, Debug)]
pub struct MotionPredictor {
    local_divisor: f32,
    remote_divisor_min: f32,
    remote_divisor_max: f32,
    deviation_scale: f32,
}

impl MotionPredictor {
    /// Creates a predictor from configuration.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            local_divisor: config.local_correction_divisor,
            remote_divisor_min: config.remote_divisor_min,
            remote_divisor_max: config.remote_divisor_max,
            deviation_scale: config.remote_deviation_scale,
        }
    }

    /// Predicts the local player's next position.
    ///
    /// `frame_dt` is in seconds, `speed` in world units per second.
    #[must_use]
    pub fn predict_local(
        &self,
        state: &MotionState,
        frame_dt: f32,
        speed: f32,
        bounds: &WorldBounds,
    ) -> Vec2 {
        let area = bounds.inset(state.half_extent);
        let predicted = area.clamp(state.position + displacement(state, frame_dt, speed));
        let anchor = area.clamp(state.anchor);
        blend(predicted, anchor, self.local_divisor, &area)
    }

    /// Predicts a remote entity's next position.
    ///
    /// Remote entities report no speed of their own; `speed` is the shared
    /// calibrated estimate.
    #[must_use]
    pub fn predict_remote(
        &self,
        state: &MotionState,
        frame_dt: f32,
        speed: f32,
        bounds: &WorldBounds,
    ) -> Vec2 {
        let area = bounds.inset(state.half_extent);
        let predicted = area.clamp(state.position + displacement(state, frame_dt, speed));
        let anchor = area.clamp(state.anchor);
        let divisor = self.remote_divisor(predicted.distance(anchor));
        blend(predicted, anchor, divisor, &area)
    }

    /// Correction divisor for a remote entity `deviation` units off its anchor.
    #[must_use]
    pub fn remote_divisor(&self, deviation: f32) -> f32 {
        if deviation.is_nan() || deviation <= MIN_DEVIATION {
            return self.remote_divisor_max;
        }
        (self.deviation_scale / deviation).clamp(self.remote_divisor_min, self.remote_divisor_max)
    }

    /// Advances an entity in place, picking the mode from its local flag.
    pub fn step(&self, entity: &mut Entity, frame_dt: f32, speed: f32, bounds: &WorldBounds) {
        let state = MotionState::of(entity);
        entity.position = if entity.is_local {
            self.predict_local(&state, frame_dt, speed, bounds)
        } else {
            self.predict_remote(&state, frame_dt, speed, bounds)
        };
    }
}

impl Default for MotionPredictor {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}

fn displacement(state: &MotionState, frame_dt: f32, speed: f32) -> Vec2 {
    let step = state.heading * (speed * frame_dt * state.traction);
    if step.is_finite() {
        step
    } else {
        Vec2::ZERO
    }
}

/// Moves `1/divisor` of the way from `from` to `to`, then clamps.
fn blend(from: Vec2, to: Vec2, divisor: f32, area: &WorldBounds) -> Vec2 {
    area.clamp(from + (to - from) * (1.0 / divisor))
}
