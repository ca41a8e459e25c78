//! Speed calibration from position echoes.
//!
//! The wire format never carries absolute velocity. The client learns the
//! true speed by comparing consecutive authoritative positions of the local
//! player against the traction it was sending.

use nebula_core::Vec2;

use crate::config::SyncConfig;

/// Why a sample was not used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleRejection {
    /// Traction below epsilon; distance/time would be mostly noise.
    LowTraction,
    /// Elapsed time not positive.
    NoElapsedTime,
    /// Result was not a finite number.
    NonFinite,
}

/// Running mean of observed speed.
#[derive(Clone, Debug)]
pub struct VelocityEstimator {
    /// Current estimate in world units per second.
    average: f32,
    /// Number of samples folded into the mean.
    samples: u32,
    /// Samples accepted since creation or reset.
    accepted: u64,
    /// Samples rejected since creation or reset.
    rejected: u64,
    traction_epsilon: f32,
    sample_cap: u32,
    sample_floor: u32,
    initial_speed: f32,
}

impl VelocityEstimator {
    /// Creates an estimator from configuration.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            average: config.initial_speed,
            samples: 0,
            accepted: 0,
            rejected: 0,
            traction_epsilon: config.traction_epsilon,
            sample_cap: config.velocity_sample_cap,
            sample_floor: config.velocity_sample_floor,
            initial_speed: config.initial_speed,
        }
    }

    /// Folds one observation into the estimate.
    ///
    /// Returns the instantaneous speed on success.
    ///
    /// # Errors
    ///
    /// Returns the reason the sample was discarded. Rejection is routine and
    /// never affects the estimate.
    pub fn observe(
        &mut self,
        old_position: Vec2,
        new_position: Vec2,
        elapsed_ms: f32,
        traction: f32,
    ) -> Result<f32, SampleRejection> {
        let outcome = self.instantaneous(old_position, new_position, elapsed_ms, traction);
        match outcome {
            Ok(speed) => {
                self.fold(speed);
                self.accepted += 1;
            }
            Err(reason) => {
                self.rejected += 1;
                tracing::trace!("Velocity sample rejected: {:?}", reason);
            }
        }
        outcome
    }

    fn instantaneous(
        &self,
        old_position: Vec2,
        new_position: Vec2,
        elapsed_ms: f32,
        traction: f32,
    ) -> Result<f32, SampleRejection> {
        if traction.is_nan() || traction < self.traction_epsilon {
            return Err(SampleRejection::LowTraction);
        }
        if elapsed_ms.is_nan() || elapsed_ms <= 0.0 {
            return Err(SampleRejection::NoElapsedTime);
        }
        let speed = old_position.distance(new_position) / elapsed_ms * 1000.0 / traction;
        if speed.is_finite() {
            Ok(speed)
        } else {
            Err(SampleRejection::NonFinite)
        }
    }

    fn fold(&mut self, speed: f32) {
        if self.samples == 0 {
            self.average = speed;
            self.samples = 1;
            return;
        }
        let n = self.samples as f32;
        self.average = (self.average * n + speed) / (n + 1.0);
        self.samples += 1;
        // Re-weight so history cannot drown out a change in true speed.
        if self.samples > self.sample_cap {
            self.samples = self.sample_floor;
        }
    }

    /// Current speed estimate.
    #[inline]
    #[must_use]
    pub const fn estimate(&self) -> f32 {
        self.average
    }

    /// Weight of the running mean.
    #[inline]
    #[must_use]
    pub const fn sample_weight(&self) -> u32 {
        self.samples
    }

    /// Samples accepted so far.
    #[inline]
    #[must_use]
    pub const fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Samples rejected so far.
    #[inline]
    #[must_use]
    pub const fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Forgets everything learned.
    pub fn reset(&mut self) {
        self.average = self.initial_speed;
        self.samples = 0;
        self.accepted = 0;
        self.rejected = 0;
    }
}

impl Default for VelocityEstimator {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}
