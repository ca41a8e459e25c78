//! # Rotation Interpolation
//!
//! Angles live in (-180°, 180°]. Tweening straight from 170° to -170°
//! would spin the long way round, so a target across the seam is reached in
//! two phases:
//!
//! ```text
//!   old ──phase 1──▶ ±180 │ ∓180 ──phase 2──▶ target
//!        (arc a)          │ snap      (arc b)
//!
//!   duration(phase 1) = T · a / (a + b)
//!   duration(phase 2) = T − duration(phase 1)
//! ```
//!
//! Angular speed stays constant across the handoff and the total duration is
//! always `T`.

use std::collections::HashMap;

use nebula_core::{normalize_degrees, EntityId};

/// Target changes smaller than this (degrees) do not restart a tween.
const RETARGET_EPSILON: f32 = 0.01;

/// One linear segment of a rotation tween.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TweenPhase {
    /// Start angle (degrees).
    pub from: f32,
    /// End angle (degrees).
    pub to: f32,
    /// Duration (ms).
    pub duration_ms: f32,
}

impl TweenPhase {
    /// Angle covered by this phase.
    #[inline]
    #[must_use]
    pub fn arc(&self) -> f32 {
        (self.to - self.from).abs()
    }

    fn sample(&self, elapsed_ms: f32) -> f32 {
        if self.duration_ms <= 0.0 {
            return self.to;
        }
        let t = (elapsed_ms / self.duration_ms).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }
}

/// Shortest-path rotation from one angle to another over a fixed duration.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationTween {
    phases: Vec<TweenPhase>,
    elapsed_ms: f32,
    duration_ms: f32,
}

impl RotationTween {
    /// Plans a tween from `old` to `target` lasting `duration_ms`.
    #[must_use]
    pub fn new(old: f32, target: f32, duration_ms: f32) -> Self {
        let old = normalize_degrees(old);
        let target = normalize_degrees(target);
        let duration_ms = duration_ms.max(0.0);
        let diff = target - old;

        let phases = if diff.abs() <= 180.0 {
            vec![TweenPhase {
                from: old,
                to: target,
                duration_ms,
            }]
        } else {
            // Seam crossing: go to the nearer boundary, reappear on the other side.
            let (near, far) = if diff > 0.0 { (-180.0, 180.0) } else { (180.0, -180.0) };
            let arc_a = (near - old).abs();
            let arc_b = (target - far).abs();
            let first = duration_ms * arc_a / (arc_a + arc_b);
            vec![
                TweenPhase {
                    from: old,
                    to: near,
                    duration_ms: first,
                },
                TweenPhase {
                    from: far,
                    to: target,
                    duration_ms: duration_ms - first,
                },
            ]
        };

        Self {
            phases,
            elapsed_ms: 0.0,
            duration_ms,
        }
    }

    /// The planned phases, one or two.
    #[must_use]
    pub fn phases(&self) -> &[TweenPhase] {
        &self.phases
    }

    /// Total angle travelled.
    #[must_use]
    pub fn total_arc(&self) -> f32 {
        self.phases.iter().map(TweenPhase::arc).sum()
    }

    /// Total duration (ms).
    #[inline]
    #[must_use]
    pub const fn duration_ms(&self) -> f32 {
        self.duration_ms
    }

    /// Final angle.
    #[must_use]
    pub fn target(&self) -> f32 {
        self.phases.last().map_or(0.0, |p| p.to)
    }

    /// Angle at `elapsed_ms` after the start.
    #[must_use]
    pub fn sample(&self, elapsed_ms: f32) -> f32 {
        let mut remaining = elapsed_ms.max(0.0);
        for (i, phase) in self.phases.iter().enumerate() {
            let last = i + 1 == self.phases.len();
            if remaining < phase.duration_ms || last {
                return phase.sample(remaining);
            }
            remaining -= phase.duration_ms;
        }
        self.target()
    }

    /// Advances the tween and returns the current angle.
    pub fn advance(&mut self, dt_ms: f32) -> f32 {
        self.elapsed_ms = (self.elapsed_ms + dt_ms.max(0.0)).min(self.duration_ms);
        self.sample(self.elapsed_ms)
    }

    /// Returns true once the full duration has elapsed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }
}

#[derive(Clone, Debug)]
struct RotationTrack {
    displayed: f32,
    target: f32,
    tween: Option<RotationTween>,
}

/// Per-entity rotation smoothing.
#[derive(Clone, Debug)]
pub struct RotationSmoother {
    duration_ms: f32,
    tracks: HashMap<EntityId, RotationTrack>,
}

impl RotationSmoother {
    /// Creates a smoother whose tweens last `duration_ms`.
    #[must_use]
    pub fn new(duration_ms: f32) -> Self {
        Self {
            duration_ms,
            tracks: HashMap::new(),
        }
    }

    /// Feeds the current target angle of an entity and advances its tween.
    ///
    /// The first target seen for an entity is applied immediately. Returns
    /// the angle to display.
    pub fn update(&mut self, id: EntityId, target: f32, dt_ms: f32) -> f32 {
        let target = normalize_degrees(target);
        let track = self.tracks.entry(id).or_insert(RotationTrack {
            displayed: target,
            target,
            tween: None,
        });

        if normalize_degrees(target - track.target).abs() > RETARGET_EPSILON {
            track.target = target;
            track.tween = Some(RotationTween::new(track.displayed, target, self.duration_ms));
        }

        if let Some(tween) = track.tween.as_mut() {
            track.displayed = tween.advance(dt_ms);
            if tween.is_finished() {
                track.tween = None;
            }
        }
        track.displayed
    }

    /// Angle currently displayed for an entity.
    #[must_use]
    pub fn displayed(&self, id: EntityId) -> Option<f32> {
        self.tracks.get(&id).map(|t| t.displayed)
    }

    /// Returns true while the entity is mid-tween.
    #[must_use]
    pub fn is_animating(&self, id: EntityId) -> bool {
        self.tracks.get(&id).is_some_and(|t| t.tween.is_some())
    }

    /// Drops the track of an evicted entity.
    pub fn remove(&mut self, id: EntityId) {
        self.tracks.remove(&id);
    }

    /// Drops every track.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn shortest(a: f32, b: f32) -> f32 {
        let d = (b - a).abs();
        d.min(360.0 - d)
    }

    #[test]
    fn test_single_phase() {
        let tween = RotationTween::new(10.0, 100.0, 100.0);
        assert_eq!(tween.phases().len(), 1);
        assert!((tween.sample(50.0) - 55.0).abs() < 1e-4);
        assert_eq!(tween.sample(100.0), 100.0);
    }

    #[test]
    fn test_seam_crossing_positive_to_negative() {
        // 170 -> -170 goes up through 180.
        let tween = RotationTween::new(170.0, -170.0, 100.0);
        let phases = tween.phases();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].to, 180.0);
        assert_eq!(phases[1].from, -180.0);
        assert!((phases[0].duration_ms - 50.0).abs() < 1e-4);
        assert!((tween.total_arc() - 20.0).abs() < 1e-4);

        assert!((tween.sample(25.0) - 175.0).abs() < 1e-3);
        assert!((tween.sample(75.0) + 175.0).abs() < 1e-3);
        assert_eq!(tween.sample(100.0), -170.0);
    }

    #[test]
    fn test_snaps_to_opposite_boundary_at_handoff() {
        let tween = RotationTween::new(170.0, -170.0, 100.0);
        let handoff = tween.phases()[0].duration_ms;
        assert!(tween.sample(handoff - 0.5) > 179.0);
        assert_eq!(tween.sample(handoff), tween.phases()[1].from);
        assert_eq!(tween.sample(handoff), -180.0);

        let tween = RotationTween::new(-150.0, 170.0, 80.0);
        let handoff = tween.phases()[0].duration_ms;
        assert!(tween.sample(handoff - 0.5) < -179.0);
        assert_eq!(tween.sample(handoff), 180.0);
    }

    #[test]
    fn test_seam_crossing_negative_to_positive() {
        // -150 -> 170: 30 down to -180, 10 from 180 down to 170.
        let tween = RotationTween::new(-150.0, 170.0, 80.0);
        let phases = tween.phases();
        assert_eq!(phases[0].to, -180.0);
        assert_eq!(phases[1].from, 180.0);
        assert!((phases[0].duration_ms - 60.0).abs() < 1e-3);
        assert!((phases[1].duration_ms - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_advance_finishes() {
        let mut tween = RotationTween::new(0.0, 90.0, 100.0);
        tween.advance(60.0);
        assert!(!tween.is_finished());
        assert_eq!(tween.advance(60.0), 90.0);
        assert!(tween.is_finished());
    }

    #[test]
    fn test_rotation_continuity_randomized() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..5000 {
            let old = normalize_degrees(rng.gen_range(-180.0f32..=180.0));
            let target = normalize_degrees(rng.gen_range(-180.0f32..=180.0));
            let duration = rng.gen_range(1.0f32..500.0);
            let tween = RotationTween::new(old, target, duration);

            assert!(
                (tween.total_arc() - shortest(old, target)).abs() < 1e-2,
                "arc mismatch for {old} -> {target}"
            );
            let total: f32 = tween.phases().iter().map(|p| p.duration_ms).sum();
            assert!((total - duration).abs() < 1e-2);
            assert!((tween.sample(duration) - target).abs() < 1e-3);
        }
    }

    #[test]
    fn test_smoother_first_sight_snaps() {
        let mut smoother = RotationSmoother::new(100.0);
        assert_eq!(smoother.update(EntityId(1), 45.0, 16.0), 45.0);
        assert!(!smoother.is_animating(EntityId(1)));
    }

    #[test]
    fn test_smoother_retargets() {
        let mut smoother = RotationSmoother::new(100.0);
        smoother.update(EntityId(1), 0.0, 16.0);
        let mid = smoother.update(EntityId(1), 90.0, 50.0);
        assert!((mid - 45.0).abs() < 1e-3);
        assert!(smoother.is_animating(EntityId(1)));
        assert_eq!(smoother.update(EntityId(1), 90.0, 100.0), 90.0);
        assert!(!smoother.is_animating(EntityId(1)));

        smoother.remove(EntityId(1));
        assert!(smoother.is_empty());
    }
}
