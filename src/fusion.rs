//! Cross-estimate fusion
//!
//! An observer produces an independent estimate of a target's position by
//! walking from its own inertial estimate toward the target's prior
//! position, scaled to the measured range, and blending the result with
//! the target's GNSS reading.

use crate::agent::{Agent, Position};
use crate::error::{Result, SwarmError};
use crate::params::validate_fusion_weight;

/// Range/GNSS fusion with a fixed blend weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionEstimator {
    alpha: f64,
}

impl FusionEstimator {
    /// Create an estimator with GNSS weight `alpha` in [0, 1].
    pub fn new(alpha: f64) -> Result<Self> {
        validate_fusion_weight(alpha)?;
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Estimate `target`'s position as seen from `observer`.
    ///
    /// Falls back to the target's GNSS reading when the observer's inertial
    /// estimate coincides with the target's prior position.
    pub fn fuse(&self, observer: &Agent, target: &Agent) -> Result<Position> {
        let measured_range =
            observer
                .range_to(target.id())
                .ok_or(SwarmError::MissingMeasurement {
                    observer: observer.id(),
                    target: target.id(),
                })?;

        let origin = observer.inertial_estimate();
        let direction = target.prior_position() - origin;
        let norm = direction.norm();
        if norm == 0.0 {
            return Ok(target.gnss_reading());
        }

        let range_estimate = origin + direction * (measured_range / norm);
        Ok(target.gnss_reading() * self.alpha + range_estimate * (1.0 - self.alpha))
    }
}
