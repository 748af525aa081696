use std::time::Duration;

use crate::crypto::MAX_SHARES;

/// Default number of escrow agents
pub const DEFAULT_AGENTS: usize = 5;
/// Default number of shares needed for recovery
pub const DEFAULT_THRESHOLD: usize = 3;
/// Default upper bound on any single receive
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("threshold {threshold} must be between 1 and the agent count {agents}")]
    InvalidThreshold { threshold: usize, agents: usize },
    #[error("agent count {0} must be between 1 and 255")]
    InvalidAgentCount(usize),
    #[error("receive timeout must be non-zero")]
    ZeroTimeout,
}

/// Runtime parameters of one escrow session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowConfig {
    /// Number of escrow agents, `n`
    pub agents: usize,
    /// Shares required to reconstruct, `t`
    pub threshold: usize,
    /// Deadline applied to every blocking receive
    pub receive_timeout: Duration,
    /// Extra pause the authority takes after the deposit completes,
    ///  before broadcasting the release
    pub release_delay: Duration,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            agents: DEFAULT_AGENTS,
            threshold: DEFAULT_THRESHOLD,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            release_delay: Duration::ZERO,
        }
    }
}

impl EscrowConfig {
    pub fn new(agents: usize, threshold: usize) -> Self {
        Self {
            agents,
            threshold,
            ..Default::default()
        }
    }

    pub fn with_receive_timeout(mut self, receive_timeout: Duration) -> Self {
        self.receive_timeout = receive_timeout;
        self
    }

    pub fn with_release_delay(mut self, release_delay: Duration) -> Self {
        self.release_delay = release_delay;
        self
    }

    /// Check `1 <= t <= n <= 255` and a usable deadline
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents == 0 || self.agents > MAX_SHARES {
            return Err(ConfigError::InvalidAgentCount(self.agents));
        }
        if self.threshold == 0 || self.threshold > self.agents {
            return Err(ConfigError::InvalidThreshold {
                threshold: self.threshold,
                agents: self.agents,
            });
        }
        if self.receive_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
