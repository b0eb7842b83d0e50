//! Error and detection metrics

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::agent::{AgentId, Position, Swarm};
use crate::error::{Result, SwarmError};

/// Position error against ground truth, averaged over every coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorMetrics {
    pub mae: f64,
    pub rmse: f64,
}

#[derive(Debug, Default, Clone)]
pub struct ErrorAccumulator {
    abs_sum: f64,
    sq_sum: f64,
    count: usize,
}

impl ErrorAccumulator {
    pub fn observe(&mut self, estimate: Position, truth: Position) {
        for err in (estimate - truth).iter() {
            self.abs_sum += err.abs();
            self.sq_sum += err * err;
            self.count += 1;
        }
    }

    pub fn finalize(&self) -> ErrorMetrics {
        if self.count == 0 {
            return ErrorMetrics {
                mae: 0.0,
                rmse: 0.0,
            };
        }
        let n = self.count as f64;
        ErrorMetrics {
            mae: self.abs_sum / n,
            rmse: (self.sq_sum / n).sqrt(),
        }
    }
}

/// Error of every agent's raw GNSS reading.
pub fn gnss_error(swarm: &Swarm) -> ErrorMetrics {
    let mut acc = ErrorAccumulator::default();
    for agent in swarm.agents() {
        acc.observe(agent.gnss_reading(), agent.true_position());
    }
    acc.finalize()
}

/// Error of a round's final positions. Every agent must have one.
pub fn position_error(
    swarm: &Swarm,
    positions: &BTreeMap<AgentId, Position>,
) -> Result<ErrorMetrics> {
    let mut acc = ErrorAccumulator::default();
    for agent in swarm.agents() {
        let estimate = positions.get(&agent.id()).ok_or_else(|| {
            SwarmError::invalid(format!("no final position for agent {}", agent.id()))
        })?;
        acc.observe(*estimate, agent.true_position());
    }
    Ok(acc.finalize())
}

/// Detection outcome compared with the set of agents that were actually attacked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DetectionStats {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl DetectionStats {
    pub fn compare(flagged: &BTreeSet<AgentId>, attacked: &BTreeSet<AgentId>) -> Self {
        Self {
            true_positives: flagged.intersection(attacked).count(),
            false_positives: flagged.difference(attacked).count(),
            false_negatives: attacked.difference(flagged).count(),
        }
    }
}
