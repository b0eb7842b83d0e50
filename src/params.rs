//! Consensus round parameters
//!
//! Concrete values used by one round, after any randomized configuration
//! has been resolved.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwarmError};

/// Parameters for one consensus round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundParams {
    /// Residual threshold T; a cross-estimate within T of the GNSS reading is a consistent vote
    pub residual_threshold: f64,
    /// Assumed upper bound f on simultaneously faulty agents
    pub max_faulty: usize,
    /// GNSS weight alpha in the fusion blend (0 <= alpha <= 1)
    pub fusion_weight: f64,
}

impl RoundParams {
    /// Create validated round parameters
    pub fn new(residual_threshold: f64, max_faulty: usize, fusion_weight: f64) -> Result<Self> {
        let params = Self {
            residual_threshold,
            max_faulty,
            fusion_weight,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.residual_threshold.is_finite() || self.residual_threshold <= 0.0 {
            return Err(SwarmError::invalid(format!(
                "residual threshold must be finite and > 0, got {}",
                self.residual_threshold
            )));
        }
        validate_fusion_weight(self.fusion_weight)?;
        if self.max_faulty == 0 {
            return Err(SwarmError::invalid("max_faulty must be >= 1"));
        }
        Ok(())
    }

    /// Check `f < N` for a swarm of `swarm_size` agents.
    pub fn validate_for_swarm(&self, swarm_size: usize) -> Result<()> {
        if self.max_faulty >= swarm_size {
            return Err(SwarmError::invalid(format!(
                "max_faulty ({}) must be smaller than the swarm size ({swarm_size})",
                self.max_faulty
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_fusion_weight(alpha: f64) -> Result<()> {
    if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
        return Err(SwarmError::invalid(format!(
            "fusion weight must lie in [0, 1], got {alpha}"
        )));
    }
    Ok(())
}

/// Minimum-variance GNSS weight: `var_range / (var_gnss + var_range)`.
pub fn minimum_variance_weight(gnss_var: f64, range_var: f64) -> f64 {
    range_var / (gnss_var + range_var)
}

/// Residual threshold `scale * sqrt(var_gnss + std_range^2)`.
pub fn calibrated_threshold(scale: f64, gnss_var: f64, range_std: f64) -> f64 {
    scale * (gnss_var + range_std * range_std).sqrt()
}
