use std::sync::Arc;

use crate::crypto::{combine, Envelope, EnvelopeError, SecretKey, ShamirError, Share};
use crate::keystore::{KeyRegistry, ProvisioningError, Role};
use crate::reference::{ReferenceError, ReferenceStore};

use super::config::EscrowConfig;
use super::messages::{AgentHandle, ChannelError, DepositNotice, Inbox};
use super::packet::{parse_packet, PacketError};

/// Result of a recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Reconstructed secret matches the reference copy
    Verified,
    /// Reconstruction succeeded but produced a different secret
    Mismatch,
    /// Fewer than `threshold` valid shares arrived before the deadline
    Unavailable { collected: usize, threshold: usize },
}

impl RecoveryOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl std::fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Mismatch => write!(f, "mismatch"),
            Self::Unavailable {
                collected,
                threshold,
            } => write!(f, "unavailable ({}/{} shares)", collected, threshold),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    #[error("key material unavailable: {0}")]
    Provisioning(#[from] ProvisioningError),
    #[error("deposit never completed: {0}")]
    DepositIncomplete(ChannelError),
    #[error("timed out with {collected} of {threshold} shares")]
    Timeout { collected: usize, threshold: usize },
    #[error("every agent hung up with {collected} shares collected")]
    ChannelClosed { collected: usize },
    #[error("reconstruction failed: {0}")]
    Reconstruction(#[from] ShamirError),
    #[error("reference copy unavailable: {0}")]
    Reference(#[from] ReferenceError),
}

/// Shares collected so far, at most one per agent index
#[derive(Debug, Clone)]
pub struct ReconstructionSet {
    threshold: usize,
    shares: Vec<Share>,
}

impl ReconstructionSet {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            shares: Vec::with_capacity(threshold),
        }
    }

    /// Add a share; returns false if the set is already complete or holds
    /// this index
    pub fn insert(&mut self, share: Share) -> bool {
        if self.is_complete() || self.contains(share.index()) {
            return false;
        }
        self.shares.push(share);
        true
    }

    pub fn contains(&self, index: u8) -> bool {
        self.shares.iter().any(|s| s.index() == index)
    }

    pub fn is_complete(&self) -> bool {
        self.shares.len() >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn into_shares(self) -> Vec<Share> {
        self.shares
    }
}

#[derive(Debug, thiserror::Error)]
enum PacketRejection {
    #[error("{0}")]
    Envelope(#[from] EnvelopeError),
    #[error("{0}")]
    Packet(#[from] PacketError),
}

/// Reassembles the secret once the deposit phase is over
///
/// Waits for the depositor's completion notice, authorizes every agent,
/// collects `threshold` distinct shares from its shared inbox and checks
/// the reconstruction against the reference copy.
#[derive(Debug)]
pub struct RecoveryAuthority {
    config: EscrowConfig,
    secret_key: SecretKey,
    agents: Vec<AgentHandle>,
    completion: Inbox<DepositNotice>,
    inbox: Inbox<Envelope>,
    reference: Arc<dyn ReferenceStore>,
}

impl RecoveryAuthority {
    pub fn new(
        config: EscrowConfig,
        registry: &KeyRegistry,
        agents: Vec<AgentHandle>,
        completion: Inbox<DepositNotice>,
        inbox: Inbox<Envelope>,
        reference: Arc<dyn ReferenceStore>,
    ) -> Result<Self, AuthorityError> {
        Ok(Self {
            secret_key: registry.secret_key(Role::Authority)?,
            config,
            agents,
            completion,
            inbox,
            reference,
        })
    }

    pub async fn run(self) -> Result<RecoveryOutcome, AuthorityError> {
        let timeout = self.config.receive_timeout;
        let threshold = self.config.threshold;

        let DepositNotice::Completed { delivered } = self
            .completion
            .recv_within(timeout)
            .await
            .map_err(AuthorityError::DepositIncomplete)?;
        tracing::info!("deposit reached {} agents", delivered);

        if !self.config.release_delay.is_zero() {
            tokio::time::sleep(self.config.release_delay).await;
        }

        for agent in &self.agents {
            if let Err(e) = agent.authorize() {
                tracing::warn!("could not authorize agent {}: {}", agent.index(), e);
            }
        }
        tracing::info!("authorized {} agents, collecting {} shares", self.agents.len(), threshold);

        let mut set = ReconstructionSet::new(threshold);
        while !set.is_complete() {
            let envelope = match self.inbox.recv_within(timeout).await {
                Ok(envelope) => envelope,
                Err(ChannelError::Timeout(_)) => {
                    return Err(AuthorityError::Timeout {
                        collected: set.len(),
                        threshold,
                    })
                }
                Err(ChannelError::Closed) => {
                    return Err(AuthorityError::ChannelClosed {
                        collected: set.len(),
                    })
                }
            };

            let share = match self.open(&envelope) {
                Ok(share) => share,
                Err(e) => {
                    tracing::warn!("discarding unreadable share packet: {}", e);
                    continue;
                }
            };

            let index = share.index();
            if index as usize > self.config.agents {
                tracing::warn!("discarding share for unknown agent {}", index);
                continue;
            }
            if set.insert(share) {
                tracing::debug!("collected share {} ({}/{})", index, set.len(), threshold);
            } else {
                tracing::warn!("discarding duplicate share for agent {}", index);
            }
        }

        let recovered = combine(&set.into_shares())?;
        let reference = self.reference.read().await?;

        if recovered == reference {
            tracing::info!("recovered secret matches reference");
            Ok(RecoveryOutcome::Verified)
        } else {
            tracing::warn!("recovered secret does not match reference");
            Ok(RecoveryOutcome::Mismatch)
        }
    }

    fn open(&self, envelope: &Envelope) -> Result<Share, PacketRejection> {
        let packet = envelope.open(&self.secret_key)?;
        Ok(parse_packet(&packet)?)
    }
}
