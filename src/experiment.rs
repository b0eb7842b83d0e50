//! Baseline-then-attack experiment driver
//!
//! Generates a swarm, runs a clean round, injects the configured attack,
//! and runs a second round, threading a single seeded RNG through every
//! random draw.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use crate::agent::{AgentId, Position, Swarm};
use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::metrics::{gnss_error, position_error, DetectionStats, ErrorMetrics};
use crate::params::RoundParams;
use crate::round::{ConsensusRound, RoundOutcome};
use crate::scenario::{generate_swarm, inject_attack, RandomAttackerBallots};

/// Summary of one round
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub params: RoundParams,
    pub faulty: BTreeSet<AgentId>,
    pub gnss_error: ErrorMetrics,
    pub final_error: ErrorMetrics,
    #[serde(skip)]
    pub final_positions: BTreeMap<AgentId, Position>,
}

impl RoundReport {
    fn new(swarm: &Swarm, outcome: RoundOutcome) -> Result<Self> {
        Ok(Self {
            params: outcome.params,
            gnss_error: gnss_error(swarm),
            final_error: position_error(swarm, &outcome.final_positions)?,
            faulty: outcome.faulty,
            final_positions: outcome.final_positions,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub seed: u64,
    pub num_agents: usize,
    pub attacked_ids: BTreeSet<AgentId>,
    pub baseline: RoundReport,
    pub attacked: RoundReport,
    pub detection: DetectionStats,
    /// Swarm state after the attack, for downstream rendering
    #[serde(skip)]
    pub swarm: Swarm,
}

impl ExperimentReport {
    /// Pretty-printed JSON of the report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentReport> {
    config.validate()?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut swarm = generate_swarm(&config.scenario, &mut rng)?;

    let baseline_params = config.baseline.resolve(&mut rng)?;
    let baseline = ConsensusRound::new(baseline_params)?.run(&swarm)?;
    let baseline = RoundReport::new(&swarm, baseline)?;
    info!(faulty = ?baseline.faulty, "baseline round complete");

    let attacked_ids = inject_attack(&mut swarm, &config.attack, &mut rng)?;
    info!(attacked = ?attacked_ids, "attack injected");

    let attacked_params = config.attacked.resolve(&mut rng)?;
    let round = ConsensusRound::new(attacked_params)?;
    let outcome = if config.attack.random_votes {
        let mut ballots = RandomAttackerBallots::new(attacked_ids.clone(), &mut rng);
        round.run_with(&swarm, &mut ballots)?
    } else {
        round.run(&swarm)?
    };
    let attacked = RoundReport::new(&swarm, outcome)?;

    let detection = DetectionStats::compare(&attacked.faulty, &attacked_ids);
    info!(
        true_positives = detection.true_positives,
        false_positives = detection.false_positives,
        false_negatives = detection.false_negatives,
        "attacked round complete"
    );

    Ok(ExperimentReport {
        seed: config.seed,
        num_agents: swarm.len(),
        attacked_ids,
        baseline,
        attacked,
        detection,
        swarm,
    })
}
