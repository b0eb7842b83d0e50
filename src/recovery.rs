//! Median recovery of faulty agents
//!
//! A faulty agent's position is replaced by the coordinate-wise median of
//! the cross-estimates its peers fused for it. With N = 2 there is a single
//! peer estimate and the median offers no robustness.

use std::collections::{BTreeMap, BTreeSet};

use crate::agent::{AgentId, Position, Swarm};
use crate::error::{Result, SwarmError};
use crate::fusion::FusionEstimator;
use crate::voting::CrossEstimates;

/// Median of a non-empty slice; mean of the two middle values for even lengths.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Coordinate-wise median of a set of positions.
pub fn coordinate_median(points: &[Position]) -> Option<Position> {
    let mut xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let mut ys: Vec<f64> = points.iter().map(|p| p.y).collect();
    Some(Position::new(median(&mut xs)?, median(&mut ys)?))
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryEngine {
    fusion: FusionEstimator,
}

impl RecoveryEngine {
    pub fn new(fusion: FusionEstimator) -> Self {
        Self { fusion }
    }

    /// Recompute peer cross-estimates for each faulty id and take their median.
    /// The swarm is validated first, even when `faulty` is empty.
    pub fn recover(
        &self,
        swarm: &Swarm,
        faulty: &BTreeSet<AgentId>,
    ) -> Result<BTreeMap<AgentId, Position>> {
        swarm.validate()?;
        let mut recovered = BTreeMap::new();

        for &id in faulty {
            let target = swarm
                .get(id)
                .ok_or_else(|| SwarmError::invalid(format!("unknown faulty agent {id}")))?;
            let estimates = swarm
                .agents()
                .filter(|observer| observer.id() != id)
                .map(|observer| self.fusion.fuse(observer, target))
                .collect::<Result<Vec<_>>>()?;
            recovered.insert(id, peer_median(id, &estimates)?);
        }

        Ok(recovered)
    }

    /// Same as [`RecoveryEngine::recover`], reusing estimates fused during voting.
    pub fn recover_from(
        &self,
        estimates: &CrossEstimates,
        faulty: &BTreeSet<AgentId>,
    ) -> Result<BTreeMap<AgentId, Position>> {
        let mut recovered = BTreeMap::new();

        for &id in faulty {
            let row = estimates
                .for_target(id)
                .ok_or_else(|| SwarmError::invalid(format!("unknown faulty agent {id}")))?;
            let points: Vec<Position> = row.iter().map(|&(_, p)| p).collect();
            recovered.insert(id, peer_median(id, &points)?);
        }

        Ok(recovered)
    }
}

fn peer_median(id: AgentId, estimates: &[Position]) -> Result<Position> {
    coordinate_median(estimates)
        .ok_or_else(|| SwarmError::invalid(format!("agent {id} has no peers to recover from")))
}
