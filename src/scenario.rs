//! Synthetic swarm scenarios and attack injection
//!
//! Builds agent sets for a consensus round from an explicitly passed RNG,
//! and perturbs them the way a spoofing attacker would.

use std::collections::BTreeSet;

use rand::seq::index::sample;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId, Position, Swarm};
use crate::error::{Result, SwarmError};
use crate::voting::{BallotPolicy, Vote};

/// Inertial noise standard deviation, fixed or drawn per agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InsNoise {
    Fixed { std_dev: f64 },
    Uniform { min: f64, max: f64 },
}

impl InsNoise {
    fn std_dev<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            InsNoise::Fixed { std_dev } => std_dev,
            InsNoise::Uniform { min, max } if min < max => rng.gen_range(min..max),
            InsNoise::Uniform { min, .. } => min,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub num_agents: usize,
    /// Side length of the square arena true positions are drawn from
    pub arena_size: f64,
    pub gnss_noise_std: f64,
    /// Spread of the previous-step displacement
    pub prior_step_std: f64,
    pub ins_noise: InsNoise,
    pub range_noise_std: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            num_agents: 5,
            arena_size: 20.0,
            gnss_noise_std: 1.0,
            prior_step_std: 1.0,
            ins_noise: InsNoise::Fixed { std_dev: 0.5 },
            range_noise_std: 0.2,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_agents < 2 {
            return Err(SwarmError::invalid(format!(
                "num_agents must be >= 2, got {}",
                self.num_agents
            )));
        }
        if !self.arena_size.is_finite() || self.arena_size <= 0.0 {
            return Err(SwarmError::invalid("arena_size must be finite and > 0"));
        }

        let stds = [
            ("gnss_noise_std", self.gnss_noise_std),
            ("prior_step_std", self.prior_step_std),
            ("range_noise_std", self.range_noise_std),
        ];
        for (name, value) in stds {
            if !value.is_finite() || value < 0.0 {
                return Err(SwarmError::invalid(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }

        match self.ins_noise {
            InsNoise::Fixed { std_dev } if !std_dev.is_finite() || std_dev < 0.0 => Err(
                SwarmError::invalid("ins_noise.std_dev must be finite and >= 0"),
            ),
            InsNoise::Uniform { min, max }
                if !min.is_finite() || !max.is_finite() || min < 0.0 || max < min =>
            {
                Err(SwarmError::invalid(
                    "ins_noise bounds must satisfy 0 <= min <= max",
                ))
            }
            _ => Ok(()),
        }
    }
}

fn normal(std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(0.0, std_dev).map_err(|e| SwarmError::invalid(format!("normal(0, {std_dev}): {e}")))
}

fn noise<R: Rng + ?Sized>(dist: &Normal<f64>, rng: &mut R) -> Position {
    Position::new(dist.sample(rng), dist.sample(rng))
}

/// Generate a fully connected swarm with ids `0..num_agents`.
pub fn generate_swarm<R: Rng + ?Sized>(config: &ScenarioConfig, rng: &mut R) -> Result<Swarm> {
    config.validate()?;

    let gnss_dist = normal(config.gnss_noise_std)?;
    let step_dist = normal(config.prior_step_std)?;
    let range_dist = normal(config.range_noise_std)?;

    let truths: Vec<Position> = (0..config.num_agents)
        .map(|_| {
            Position::new(
                rng.gen::<f64>() * config.arena_size,
                rng.gen::<f64>() * config.arena_size,
            )
        })
        .collect();

    let mut agents = Vec::with_capacity(config.num_agents);
    for (id, &truth) in truths.iter().enumerate() {
        let gnss = truth + noise(&gnss_dist, rng);
        let prior = truth - noise(&step_dist, rng);
        let ins_dist = normal(config.ins_noise.std_dev(rng))?;
        let inertial = prior + (truth - prior) + noise(&ins_dist, rng);
        agents.push(Agent::new(id, truth, gnss, prior, inertial));
    }

    for agent in agents.iter_mut() {
        for (other, truth) in truths.iter().enumerate() {
            if other == agent.id() {
                continue;
            }
            let distance = (agent.true_position() - truth).norm();
            agent.set_range(other, distance + range_dist.sample(rng));
        }
    }

    Swarm::new(agents)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub num_attacked: usize,
    /// Additive bias applied to each victim's GNSS reading
    pub gnss_bias: [f64; 2],
    /// Half-width of the uniform tampering added to a victim's own ranges
    pub range_tamper: f64,
    /// Victims vote at random when they act as observers
    pub random_votes: bool,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            num_attacked: 1,
            gnss_bias: [15.0, -15.0],
            range_tamper: 0.0,
            random_votes: false,
        }
    }
}

impl AttackConfig {
    pub fn validate(&self, num_agents: usize) -> Result<()> {
        if self.num_attacked > num_agents {
            return Err(SwarmError::invalid(format!(
                "num_attacked ({}) exceeds num_agents ({num_agents})",
                self.num_attacked
            )));
        }
        if !self.gnss_bias.iter().all(|b| b.is_finite()) {
            return Err(SwarmError::invalid("gnss_bias must be finite"));
        }
        if !self.range_tamper.is_finite() || self.range_tamper < 0.0 {
            return Err(SwarmError::invalid("range_tamper must be finite and >= 0"));
        }
        Ok(())
    }

    pub fn bias(&self) -> Position {
        Position::new(self.gnss_bias[0], self.gnss_bias[1])
    }
}

/// Pick `num_attacked` distinct agents at random and corrupt them.
pub fn inject_attack<R: Rng + ?Sized>(
    swarm: &mut Swarm,
    config: &AttackConfig,
    rng: &mut R,
) -> Result<BTreeSet<AgentId>> {
    config.validate(swarm.len())?;
    let ids: Vec<AgentId> = swarm.ids().collect();
    let victims: BTreeSet<AgentId> = sample(rng, ids.len(), config.num_attacked)
        .into_iter()
        .map(|idx| ids[idx])
        .collect();
    inject_attack_on(swarm, &victims, config, rng)?;
    Ok(victims)
}

/// Corrupt the given agents: bias their GNSS reading and tamper with their
/// outgoing ranges.
pub fn inject_attack_on<R: Rng + ?Sized>(
    swarm: &mut Swarm,
    victims: &BTreeSet<AgentId>,
    config: &AttackConfig,
    rng: &mut R,
) -> Result<()> {
    let tamper = (config.range_tamper > 0.0)
        .then(|| Uniform::new(-config.range_tamper, config.range_tamper));
    let others: Vec<AgentId> = swarm.ids().collect();

    for &id in victims {
        let agent = swarm
            .get_mut(id)
            .ok_or_else(|| SwarmError::invalid(format!("cannot attack unknown agent {id}")))?;
        agent.offset_gnss(config.bias());

        if let Some(dist) = &tamper {
            for &other in others.iter().filter(|&&o| o != id) {
                agent.offset_range(other, dist.sample(rng));
            }
        }
    }

    Ok(())
}

/// Attacked agents cast a uniformly random vote whenever they observe.
pub struct RandomAttackerBallots<'a, R: Rng + ?Sized> {
    attackers: BTreeSet<AgentId>,
    rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> RandomAttackerBallots<'a, R> {
    pub fn new(attackers: BTreeSet<AgentId>, rng: &'a mut R) -> Self {
        Self { attackers, rng }
    }
}

impl<R: Rng + ?Sized> BallotPolicy for RandomAttackerBallots<'_, R> {
    fn cast(&mut self, observer: AgentId, _target: AgentId, honest: Vote) -> Vote {
        if !self.attackers.contains(&observer) {
            return honest;
        }
        if self.rng.gen_bool(0.5) {
            Vote::Consistent
        } else {
            Vote::Inconsistent
        }
    }
}
