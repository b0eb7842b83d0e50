//! Error types for SwarmRaft

use thiserror::Error;

use crate::agent::AgentId;

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("agent {observer} has no range measurement to agent {target}")]
    MissingMeasurement { observer: AgentId, target: AgentId },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SwarmError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SwarmError>;
