//! Experiment configuration
//!
//! Serde/TOML configs for the scenario, the attack and the two consensus
//! rounds. Alpha and threshold modes resolve to concrete round parameters
//! once per round.

use std::fs;
use std::path::Path;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwarmError};
use crate::params::{calibrated_threshold, minimum_variance_weight, RoundParams};
use crate::scenario::{AttackConfig, ScenarioConfig};

/// How the GNSS fusion weight alpha is chosen for a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AlphaMode {
    Fixed { value: f64 },
    MinimumVariance { gnss_var: f64, range_var: f64 },
    /// Normal sample clipped to `[min, max]`.
    Randomized {
        mean: f64,
        std_dev: f64,
        min: f64,
        max: f64,
    },
}

impl Default for AlphaMode {
    fn default() -> Self {
        AlphaMode::MinimumVariance {
            gnss_var: 1.0,
            range_var: 0.04,
        }
    }
}

impl AlphaMode {
    pub fn validate(&self) -> Result<()> {
        match *self {
            AlphaMode::Fixed { value } => crate::params::validate_fusion_weight(value),
            AlphaMode::MinimumVariance {
                gnss_var,
                range_var,
            } => check_variances(gnss_var, range_var),
            AlphaMode::Randomized {
                mean,
                std_dev,
                min,
                max,
            } => {
                if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(SwarmError::invalid(
                        "randomized alpha needs a finite mean and a non-negative std_dev",
                    ));
                }
                if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
                    return Err(SwarmError::invalid(format!(
                        "randomized alpha bounds must satisfy 0 <= min <= max <= 1, got [{min}, {max}]"
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        self.validate()?;
        let alpha = match *self {
            AlphaMode::Fixed { value } => value,
            AlphaMode::MinimumVariance {
                gnss_var,
                range_var,
            } => minimum_variance_weight(gnss_var, range_var),
            AlphaMode::Randomized {
                mean,
                std_dev,
                min,
                max,
            } => sample_normal(rng, mean, std_dev)?.clamp(min, max),
        };
        Ok(alpha)
    }
}

/// How the residual threshold T is chosen for a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdMode {
    Fixed { value: f64 },
    /// `scale * sqrt(gnss_var + range_std^2)`
    Calibrated {
        scale: f64,
        gnss_var: f64,
        range_std: f64,
    },
    /// Calibrated threshold with the scale drawn from a normal distribution.
    Randomized {
        mean_scale: f64,
        std_dev_scale: f64,
        gnss_var: f64,
        range_std: f64,
    },
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Calibrated {
            scale: 3.0,
            gnss_var: 1.0,
            range_std: 0.2,
        }
    }
}

impl ThresholdMode {
    pub fn validate(&self) -> Result<()> {
        match *self {
            ThresholdMode::Fixed { value } => {
                if !value.is_finite() || value <= 0.0 {
                    return Err(SwarmError::invalid(format!(
                        "fixed threshold must be finite and > 0, got {value}"
                    )));
                }
                Ok(())
            }
            ThresholdMode::Calibrated {
                scale,
                gnss_var,
                range_std,
            } => {
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(SwarmError::invalid("threshold scale must be > 0"));
                }
                check_variances(gnss_var, range_std * range_std)
            }
            ThresholdMode::Randomized {
                mean_scale,
                std_dev_scale,
                gnss_var,
                range_std,
            } => {
                if !mean_scale.is_finite() || !std_dev_scale.is_finite() || std_dev_scale < 0.0 {
                    return Err(SwarmError::invalid(
                        "randomized threshold needs a finite mean_scale and a non-negative std_dev_scale",
                    ));
                }
                check_variances(gnss_var, range_std * range_std)
            }
        }
    }

    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        self.validate()?;
        let threshold = match *self {
            ThresholdMode::Fixed { value } => value,
            ThresholdMode::Calibrated {
                scale,
                gnss_var,
                range_std,
            } => calibrated_threshold(scale, gnss_var, range_std),
            ThresholdMode::Randomized {
                mean_scale,
                std_dev_scale,
                gnss_var,
                range_std,
            } => {
                let scale = sample_normal(rng, mean_scale, std_dev_scale)?;
                calibrated_threshold(scale, gnss_var, range_std)
            }
        };
        // A randomized scale can land at or below zero; RoundParams rejects it.
        Ok(threshold)
    }
}

fn check_variances(gnss_var: f64, range_var: f64) -> Result<()> {
    if !gnss_var.is_finite() || !range_var.is_finite() || gnss_var < 0.0 || range_var < 0.0 {
        return Err(SwarmError::invalid("variances must be finite and >= 0"));
    }
    if gnss_var + range_var <= 0.0 {
        return Err(SwarmError::invalid("variances must not both be zero"));
    }
    Ok(())
}

fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> Result<f64> {
    let dist = Normal::new(mean, std_dev)
        .map_err(|e| SwarmError::invalid(format!("normal({mean}, {std_dev}): {e}")))?;
    Ok(dist.sample(rng))
}

/// Consensus configuration before randomized values are drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub max_faulty: usize,
    pub alpha: AlphaMode,
    pub threshold: ThresholdMode,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            max_faulty: 1,
            alpha: AlphaMode::default(),
            threshold: ThresholdMode::default(),
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_faulty == 0 {
            return Err(SwarmError::invalid("max_faulty must be >= 1"));
        }
        self.alpha.validate()?;
        self.threshold.validate()
    }

    /// Draw the concrete parameters for one round. Randomized modes sample
    /// exactly once here, so every fusion in the round shares the same alpha.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RoundParams> {
        self.validate()?;
        let fusion_weight = self.alpha.resolve(rng)?;
        let residual_threshold = self.threshold.resolve(rng)?;
        RoundParams::new(residual_threshold, self.max_faulty, fusion_weight)
    }
}

/// Full experiment: scenario generation, attack, and the two rounds run on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub seed: u64,
    pub scenario: ScenarioConfig,
    pub attack: AttackConfig,
    /// Round run on the clean swarm
    pub baseline: ConsensusConfig,
    /// Round run after the attack is injected
    pub attacked: ConsensusConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            scenario: ScenarioConfig::default(),
            attack: AttackConfig::default(),
            baseline: ConsensusConfig::default(),
            attacked: ConsensusConfig {
                threshold: ThresholdMode::Calibrated {
                    scale: 2.0,
                    gnss_var: 1.0,
                    range_std: 0.2,
                },
                ..ConsensusConfig::default()
            },
        }
    }
}

impl ExperimentConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: ExperimentConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Attack `count` agents and assume at least that many faults in the
    /// attacked round. The baseline bound is left alone.
    pub fn set_attacker_count(&mut self, count: usize) {
        self.attack.num_attacked = count;
        self.attacked.max_faulty = self.attacked.max_faulty.max(count);
    }

    pub fn validate(&self) -> Result<()> {
        self.scenario.validate()?;
        self.attack.validate(self.scenario.num_agents)?;
        self.baseline.validate()?;
        self.attacked.validate()?;

        if self.attacked.max_faulty >= self.scenario.num_agents {
            return Err(SwarmError::invalid(format!(
                "attacked.max_faulty ({}) must be smaller than num_agents ({})",
                self.attacked.max_faulty, self.scenario.num_agents
            )));
        }
        if self.baseline.max_faulty >= self.scenario.num_agents {
            return Err(SwarmError::invalid(format!(
                "baseline.max_faulty ({}) must be smaller than num_agents ({})",
                self.baseline.max_faulty, self.scenario.num_agents
            )));
        }
        Ok(())
    }
}
