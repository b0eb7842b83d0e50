//! Agent state representation
//!
//! Each swarm member carries:
//! - a ground-truth position (evaluation only, never read by the round)
//! - a GNSS reading, the quantity under test
//! - a prior position and an inertial estimate propagated from it
//! - measured ranges to every other agent

use std::collections::BTreeMap;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwarmError};

/// Planar position in metres.
pub type Position = Vector2<f64>;

/// Stable agent identifier.
pub type AgentId = usize;

/// State of a single swarm member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    id: AgentId,
    true_position: Position,
    gnss_reading: Position,
    prior_position: Position,
    inertial_estimate: Position,
    range_to: BTreeMap<AgentId, f64>,
}

impl Agent {
    /// Create an agent with an empty range map
    pub fn new(
        id: AgentId,
        true_position: Position,
        gnss_reading: Position,
        prior_position: Position,
        inertial_estimate: Position,
    ) -> Self {
        Self {
            id,
            true_position,
            gnss_reading,
            prior_position,
            inertial_estimate,
            range_to: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn true_position(&self) -> Position {
        self.true_position
    }

    pub fn gnss_reading(&self) -> Position {
        self.gnss_reading
    }

    pub fn prior_position(&self) -> Position {
        self.prior_position
    }

    pub fn inertial_estimate(&self) -> Position {
        self.inertial_estimate
    }

    /// Measured range from this agent to `other`, if one was recorded.
    pub fn range_to(&self, other: AgentId) -> Option<f64> {
        self.range_to.get(&other).copied()
    }

    pub fn ranges(&self) -> &BTreeMap<AgentId, f64> {
        &self.range_to
    }

    /// Record this agent's range measurement to `other`.
    pub fn set_range(&mut self, other: AgentId, distance: f64) {
        self.range_to.insert(other, distance);
    }

    /// Shift the GNSS reading by an additive bias.
    pub fn offset_gnss(&mut self, bias: Position) {
        self.gnss_reading += bias;
    }

    /// Perturb an existing range entry. Returns false if no entry exists.
    pub fn offset_range(&mut self, other: AgentId, delta: f64) -> bool {
        match self.range_to.get_mut(&other) {
            Some(range) => {
                *range += delta;
                true
            }
            None => false,
        }
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("true_position", self.true_position),
            ("gnss_reading", self.gnss_reading),
            ("prior_position", self.prior_position),
            ("inertial_estimate", self.inertial_estimate),
        ];
        for (name, value) in fields {
            if !value.iter().all(|c| c.is_finite()) {
                return Err(SwarmError::invalid(format!(
                    "agent {}: {name} must be finite",
                    self.id
                )));
            }
        }

        for (&other, &range) in &self.range_to {
            if !range.is_finite() {
                return Err(SwarmError::invalid(format!(
                    "agent {}: range to {other} must be finite",
                    self.id
                )));
            }
        }

        Ok(())
    }
}

/// Ordered collection of agents keyed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Swarm {
    agents: BTreeMap<AgentId, Agent>,
}

impl Swarm {
    /// Build a swarm, rejecting duplicate ids.
    pub fn new(agents: impl IntoIterator<Item = Agent>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for agent in agents {
            let id = agent.id();
            if map.insert(id, agent).is_some() {
                return Err(SwarmError::invalid(format!("duplicate agent id {id}")));
            }
        }
        Ok(Self { agents: map })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Agent ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    /// Agents in ascending id order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.values()
    }

    /// Check the preconditions of a consensus round: at least two agents,
    /// finite state, and a range entry from every agent to every other.
    pub fn validate(&self) -> Result<()> {
        if self.agents.len() < 2 {
            return Err(SwarmError::invalid(format!(
                "swarm needs at least 2 agents, got {}",
                self.agents.len()
            )));
        }

        for agent in self.agents.values() {
            agent.validate()?;
            for other in self.agents.keys().copied().filter(|&o| o != agent.id()) {
                if agent.range_to(other).is_none() {
                    return Err(SwarmError::MissingMeasurement {
                        observer: agent.id(),
                        target: other,
                    });
                }
            }
        }

        Ok(())
    }
}
