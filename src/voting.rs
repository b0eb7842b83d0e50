//! Pairwise cross-validation voting
//!
//! Every ordered pair (observer, target) fuses a cross-estimate of the
//! target and votes on whether the target's GNSS reading agrees with it.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::agent::{Agent, AgentId, Position, Swarm};
use crate::error::{Result, SwarmError};
use crate::fusion::FusionEstimator;

/// A single observer's verdict on a target's GNSS reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vote {
    Consistent,
    Inconsistent,
}

impl Vote {
    /// +1 for consistent, -1 for inconsistent.
    pub fn value(self) -> i64 {
        match self {
            Vote::Consistent => 1,
            Vote::Inconsistent => -1,
        }
    }

    pub fn from_residual(residual: f64, threshold: f64) -> Self {
        if residual <= threshold {
            Vote::Consistent
        } else {
            Vote::Inconsistent
        }
    }
}

/// Votes per target, each list ordered by observer id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Votes {
    by_target: BTreeMap<AgentId, Vec<Vote>>,
}

impl Votes {
    /// Number of targets that received votes (the swarm size N).
    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    pub fn ballots(&self, target: AgentId) -> Option<&[Vote]> {
        self.by_target.get(&target).map(Vec::as_slice)
    }

    /// Sum of +1/-1 votes cast on `target`.
    pub fn tally(&self, target: AgentId) -> Option<i64> {
        self.ballots(target)
            .map(|votes| votes.iter().map(|v| v.value()).sum())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &[Vote])> + '_ {
        self.by_target.iter().map(|(&id, v)| (id, v.as_slice()))
    }
}

impl From<BTreeMap<AgentId, Vec<Vote>>> for Votes {
    fn from(by_target: BTreeMap<AgentId, Vec<Vote>>) -> Self {
        Self { by_target }
    }
}

/// Override hook for the vote an observer actually casts.
///
/// The round itself always votes honestly; simulation code can plug in a
/// policy to model compromised voters.
pub trait BallotPolicy {
    fn cast(&mut self, observer: AgentId, target: AgentId, honest: Vote) -> Vote;
}

/// Every observer casts the vote its residual check produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct HonestBallots;

impl BallotPolicy for HonestBallots {
    fn cast(&mut self, _observer: AgentId, _target: AgentId, honest: Vote) -> Vote {
        honest
    }
}

/// Fused cross-estimates for every ordered pair of a swarm
#[derive(Debug, Clone, PartialEq)]
pub struct CrossEstimates {
    by_target: BTreeMap<AgentId, Vec<(AgentId, Position)>>,
}

impl CrossEstimates {
    /// Fuse every ordered pair of a validated swarm. Targets are processed
    /// in parallel; each target's row is ordered by observer id.
    pub fn compute(swarm: &Swarm, fusion: &FusionEstimator) -> Result<Self> {
        swarm.validate()?;
        let agents: Vec<&Agent> = swarm.agents().collect();

        let rows = agents
            .par_iter()
            .map(|&target| -> Result<(AgentId, Vec<(AgentId, Position)>)> {
                let row = agents
                    .iter()
                    .filter(|observer| observer.id() != target.id())
                    .map(|&observer| fusion.fuse(observer, target).map(|p| (observer.id(), p)))
                    .collect::<Result<Vec<_>>>()?;
                Ok((target.id(), row))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            by_target: rows.into_iter().collect(),
        })
    }

    /// Estimates of `target` from each other agent, ordered by observer id.
    pub fn for_target(&self, target: AgentId) -> Option<&[(AgentId, Position)]> {
        self.by_target.get(&target).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &[(AgentId, Position)])> + '_ {
        self.by_target.iter().map(|(&id, row)| (id, row.as_slice()))
    }
}

/// Residual-threshold voting over all ordered pairs
#[derive(Debug, Clone, Copy)]
pub struct VotingEngine {
    fusion: FusionEstimator,
    threshold: f64,
}

impl VotingEngine {
    pub fn new(fusion: FusionEstimator, threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(SwarmError::invalid(format!(
                "residual threshold must be finite and > 0, got {threshold}"
            )));
        }
        Ok(Self { fusion, threshold })
    }

    pub fn fusion(&self) -> &FusionEstimator {
        &self.fusion
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Honest votes for every target: exactly N - 1 each, no self-votes.
    pub fn compute_votes(&self, swarm: &Swarm) -> Result<Votes> {
        self.compute_votes_with(swarm, &mut HonestBallots)
    }

    pub fn compute_votes_with<P: BallotPolicy + ?Sized>(
        &self,
        swarm: &Swarm,
        policy: &mut P,
    ) -> Result<Votes> {
        let estimates = CrossEstimates::compute(swarm, &self.fusion)?;
        self.cast_votes(swarm, &estimates, policy)
    }

    /// Vote on precomputed cross-estimates, in (target, observer) id order.
    pub fn cast_votes<P: BallotPolicy + ?Sized>(
        &self,
        swarm: &Swarm,
        estimates: &CrossEstimates,
        policy: &mut P,
    ) -> Result<Votes> {
        let mut by_target = BTreeMap::new();

        for (target_id, row) in estimates.iter() {
            let target = swarm.get(target_id).ok_or_else(|| {
                SwarmError::invalid(format!("cross-estimates name unknown agent {target_id}"))
            })?;
            let gnss = target.gnss_reading();

            let votes = row
                .iter()
                .map(|&(observer_id, fused)| {
                    let residual = (fused - gnss).norm();
                    let honest = Vote::from_residual(residual, self.threshold);
                    policy.cast(observer_id, target_id, honest)
                })
                .collect();
            by_target.insert(target_id, votes);
        }

        Ok(Votes { by_target })
    }
}
