//! Client configuration
//!
//! Loaded from JSON; every field has a default so an empty object is a valid
//! configuration pointing at the reference deployment.

use std::path::Path;

use careledger_validation::validate_address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address of the reference deployment of the records contract
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x7c4f5bDa50e93E74824Bd7Ab5706Fc4FC19dDf62";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What to do with a state-changing workflow issued while another is in flight
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Refuse it with `WriteInFlight`
    #[default]
    Reject,
    /// Wait until the in-flight write finishes
    Queue,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub contract_address: String,
    pub write_policy: WritePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            write_policy: WritePolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_address(&self.contract_address, "contract_address")
            .into_result()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }
}
