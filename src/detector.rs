//! Quorum-based fault detection
//!
//! Target `i` of an N-agent swarm is faulty iff `sum(votes[i]) <= -(N - f)`,
//! i.e. fewer than `f` peers still vote consistent with its GNSS reading.

use std::collections::BTreeSet;

use tracing::warn;

use crate::agent::AgentId;
use crate::error::{Result, SwarmError};
use crate::voting::Votes;

/// Fault detector parameterised by the assumed maximum faulty count `f`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultDetector {
    max_faulty: usize,
}

impl FaultDetector {
    pub fn new(max_faulty: usize) -> Result<Self> {
        if max_faulty == 0 {
            return Err(SwarmError::invalid("max_faulty must be >= 1"));
        }
        Ok(Self { max_faulty })
    }

    pub fn max_faulty(&self) -> usize {
        self.max_faulty
    }

    /// Vote margin a target must reach to be flagged, or `None` when
    /// `f >= N` and nothing can be flagged.
    pub fn margin(&self, swarm_size: usize) -> Option<i64> {
        if self.max_faulty >= swarm_size {
            return None;
        }
        Some(-((swarm_size - self.max_faulty) as i64))
    }

    /// Ids whose vote tally reaches the quorum margin.
    pub fn detect(&self, votes: &Votes) -> BTreeSet<AgentId> {
        let Some(margin) = self.margin(votes.len()) else {
            return BTreeSet::new();
        };

        let faulty: BTreeSet<AgentId> = votes
            .iter()
            .filter(|(_, ballots)| ballots.iter().map(|v| v.value()).sum::<i64>() <= margin)
            .map(|(id, _)| id)
            .collect();

        // Flagging more than f agents is reported, not rejected.
        if faulty.len() > self.max_faulty {
            warn!(
                flagged = faulty.len(),
                max_faulty = self.max_faulty,
                "more agents flagged than the assumed fault bound"
            );
        }

        faulty
    }
}
