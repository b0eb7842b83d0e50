//! SwarmRaft - swarm GNSS cross-validation
//!
//! Detects and recovers agents whose GNSS reading has been spoofed. Peers
//! fuse inertial estimates with pairwise ranges into independent
//! cross-estimates, vote on each reading against a residual threshold,
//! flag agents that lose a quorum-margin vote, and replace their position
//! with the median of their peers' cross-estimates.

pub mod agent;
pub mod config;
pub mod detector;
pub mod error;
pub mod experiment;
pub mod fusion;
pub mod metrics;
pub mod params;
pub mod recovery;
pub mod round;
pub mod scenario;
pub mod voting;

// Re-export main types
pub use agent::{Agent, AgentId, Position, Swarm};
pub use config::{AlphaMode, ConsensusConfig, ExperimentConfig, ThresholdMode};
pub use detector::FaultDetector;
pub use error::{Result, SwarmError};
pub use experiment::{run_experiment, ExperimentReport, RoundReport};
pub use fusion::FusionEstimator;
pub use metrics::{DetectionStats, ErrorMetrics};
pub use params::RoundParams;
pub use recovery::RecoveryEngine;
pub use round::{ConsensusRound, RoundOutcome, RoundState};
pub use scenario::{AttackConfig, InsNoise, RandomAttackerBallots, ScenarioConfig};
pub use voting::{BallotPolicy, CrossEstimates, HonestBallots, Vote, Votes, VotingEngine};
