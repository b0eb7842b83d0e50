//! Consensus round orchestration
//!
//! One round runs `Idle -> VotesComputed -> FaultsDetected -> Recovered ->
//! Finalized` over a read-only swarm snapshot. Any error aborts the round
//! and no partial result is returned.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info, info_span};

use crate::agent::{AgentId, Position, Swarm};
use crate::detector::FaultDetector;
use crate::error::Result;
use crate::fusion::FusionEstimator;
use crate::params::RoundParams;
use crate::recovery::RecoveryEngine;
use crate::voting::{BallotPolicy, CrossEstimates, HonestBallots, Votes, VotingEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    VotesComputed,
    FaultsDetected,
    Recovered,
    Finalized,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundState::Idle => "idle",
            RoundState::VotesComputed => "votes_computed",
            RoundState::FaultsDetected => "faults_detected",
            RoundState::Recovered => "recovered",
            RoundState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Result of a completed round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Recovered position for faulty agents, GNSS reading for everyone else
    pub final_positions: BTreeMap<AgentId, Position>,
    pub faulty: BTreeSet<AgentId>,
    pub votes: Votes,
    pub params: RoundParams,
}

/// Single-pass cross-validation round
#[derive(Debug, Clone, Copy)]
pub struct ConsensusRound {
    params: RoundParams,
    voting: VotingEngine,
    detector: FaultDetector,
    recovery: RecoveryEngine,
}

impl ConsensusRound {
    pub fn new(params: RoundParams) -> Result<Self> {
        params.validate()?;
        let fusion = FusionEstimator::new(params.fusion_weight)?;
        Ok(Self {
            params,
            voting: VotingEngine::new(fusion, params.residual_threshold)?,
            detector: FaultDetector::new(params.max_faulty)?,
            recovery: RecoveryEngine::new(fusion),
        })
    }

    pub fn params(&self) -> &RoundParams {
        &self.params
    }

    /// Run a round in which every observer votes honestly.
    pub fn run(&self, swarm: &Swarm) -> Result<RoundOutcome> {
        self.run_with(swarm, &mut HonestBallots)
    }

    /// Run a round, letting `policy` decide the vote each observer casts.
    pub fn run_with<P: BallotPolicy + ?Sized>(
        &self,
        swarm: &Swarm,
        policy: &mut P,
    ) -> Result<RoundOutcome> {
        let span = info_span!("consensus_round", agents = swarm.len());
        let _guard = span.enter();

        swarm.validate()?;
        self.params.validate_for_swarm(swarm.len())?;
        let mut state = RoundState::Idle;

        let estimates = CrossEstimates::compute(swarm, self.voting.fusion())?;
        let votes = self.voting.cast_votes(swarm, &estimates, policy)?;
        advance(&mut state, RoundState::VotesComputed);

        let faulty = self.detector.detect(&votes);
        advance(&mut state, RoundState::FaultsDetected);

        let mut recovered = self.recovery.recover_from(&estimates, &faulty)?;
        advance(&mut state, RoundState::Recovered);

        let final_positions = swarm
            .agents()
            .map(|agent| {
                let position = recovered
                    .remove(&agent.id())
                    .unwrap_or_else(|| agent.gnss_reading());
                (agent.id(), position)
            })
            .collect();
        advance(&mut state, RoundState::Finalized);

        info!(faulty = ?faulty, threshold = self.params.residual_threshold, "round finalized");

        Ok(RoundOutcome {
            final_positions,
            faulty,
            votes,
            params: self.params,
        })
    }
}

fn advance(state: &mut RoundState, next: RoundState) {
    debug!(from = %state, to = %next, "round state transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::error::SwarmError;
    use crate::voting::Vote;

    fn grid_swarm() -> Swarm {
        let truths = [
            Position::new(2.0, 3.0),
            Position::new(15.0, 4.0),
            Position::new(8.0, 17.0),
            Position::new(18.0, 16.0),
            Position::new(4.0, 12.0),
        ];
        let mut agents: Vec<Agent> = truths
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let prior = p - Position::new(0.4, 0.3);
                Agent::new(i, p, p + Position::new(0.2, -0.1), prior, p)
            })
            .collect();
        for a in agents.iter_mut() {
            for (j, t) in truths.iter().enumerate() {
                if j != a.id() {
                    let d = (a.true_position() - t).norm();
                    a.set_range(j, d);
                }
            }
        }
        Swarm::new(agents).unwrap()
    }

    fn round() -> ConsensusRound {
        ConsensusRound::new(RoundParams::new(2.0, 1, 0.04).unwrap()).unwrap()
    }

    #[test]
    fn test_clean_swarm_keeps_gnss() {
        let swarm = grid_swarm();
        let outcome = round().run(&swarm).unwrap();
        assert!(outcome.faulty.is_empty());
        for agent in swarm.agents() {
            assert_eq!(outcome.final_positions[&agent.id()], agent.gnss_reading());
        }
    }

    #[test]
    fn test_spoofed_agent_recovered() {
        let mut swarm = grid_swarm();
        swarm
            .get_mut(3)
            .unwrap()
            .offset_gnss(Position::new(15.0, -15.0));
        let outcome = round().run(&swarm).unwrap();

        assert_eq!(outcome.faulty, BTreeSet::from([3]));
        let agent = swarm.get(3).unwrap();
        let rec_err = (outcome.final_positions[&3] - agent.true_position()).norm();
        let gnss_err = (agent.gnss_reading() - agent.true_position()).norm();
        assert!(rec_err < gnss_err);
        assert_eq!(outcome.final_positions[&0], swarm.get(0).unwrap().gnss_reading());
    }

    #[test]
    fn test_every_target_gets_n_minus_one_votes() {
        let outcome = round().run(&grid_swarm()).unwrap();
        assert_eq!(outcome.votes.len(), 5);
        for (_, ballots) in outcome.votes.iter() {
            assert_eq!(ballots.len(), 4);
        }
    }

    #[test]
    fn test_missing_range_aborts_round() {
        let truths = [Position::new(0.0, 0.0), Position::new(5.0, 0.0), Position::new(0.0, 5.0)];
        let mut agents: Vec<Agent> = truths
            .iter()
            .enumerate()
            .map(|(i, &p)| Agent::new(i, p, p, p, p))
            .collect();
        agents[0].set_range(1, 5.0);
        agents[0].set_range(2, 5.0);
        agents[1].set_range(0, 5.0);
        agents[2].set_range(0, 5.0);
        agents[2].set_range(1, 50.0_f64.sqrt());
        let swarm = Swarm::new(agents).unwrap();

        match round().run(&swarm) {
            Err(SwarmError::MissingMeasurement { observer, target }) => {
                assert_eq!((observer, target), (1, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_faulty_bound_must_be_below_swarm_size() {
        let swarm = grid_swarm();
        let round = ConsensusRound::new(RoundParams::new(2.0, 5, 0.04).unwrap()).unwrap();
        assert!(matches!(
            round.run(&swarm),
            Err(SwarmError::InvalidParameter(_))
        ));
    }

    struct Silenced;

    impl BallotPolicy for Silenced {
        fn cast(&mut self, _observer: AgentId, _target: AgentId, _honest: Vote) -> Vote {
            Vote::Inconsistent
        }
    }

    #[test]
    fn test_policy_votes_feed_detection() {
        let swarm = grid_swarm();
        let outcome = round().run_with(&swarm, &mut Silenced).unwrap();
        assert_eq!(outcome.faulty.len(), 5);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RoundState::VotesComputed.to_string(), "votes_computed");
    }
}
