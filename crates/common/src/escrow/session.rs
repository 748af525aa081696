use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::Instrument;
use uuid::Uuid;

use crate::crypto::Secret;
use crate::keystore::{KeyRegistry, ProvisioningError};
use crate::reference::ReferenceStore;

use super::agent::{AgentState, EscrowAgent};
use super::authority::{AuthorityError, RecoveryAuthority, RecoveryOutcome};
use super::config::{ConfigError, EscrowConfig};
use super::depositor::{Depositor, DepositorError};
use super::messages::{channel, AgentHandle, AuthorityHandle};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid escrow parameters: {0}")]
    InvalidParameters(#[from] ConfigError),
    #[error("key material unavailable: {0}")]
    Provisioning(#[from] ProvisioningError),
    #[error("depositor failed: {0}")]
    Depositor(#[from] DepositorError),
    #[error("authority failed: {0}")]
    Authority(#[from] AuthorityError),
    #[error("actor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What one escrow session produced
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub id: Uuid,
    pub outcome: RecoveryOutcome,
    /// Final state of every agent, by index
    pub agents: BTreeMap<u8, AgentState>,
    /// Agents the depositor reached
    pub delivered: usize,
}

impl SessionReport {
    pub fn is_verified(&self) -> bool {
        self.outcome.is_verified()
    }

    /// Indices of agents that ended in `state`
    pub fn agents_in(&self, state: AgentState) -> Vec<u8> {
        self.agents
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(index, _)| *index)
            .collect()
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "session:   {}", self.id)?;
        writeln!(f, "outcome:   {}", self.outcome)?;
        writeln!(f, "delivered: {}/{}", self.delivered, self.agents.len())?;
        for (index, state) in &self.agents {
            writeln!(f, "  agent_{}: {}", index, state)?;
        }
        Ok(())
    }
}

/// Wires up and runs one complete escrow round
///
/// ```ignore
/// let registry = KeyRegistry::generate(5)?;
/// let report = EscrowSession::new(EscrowConfig::new(5, 3), registry, Arc::new(MemoryReferenceStore::new()))
///     .run()
///     .await?;
/// assert!(report.is_verified());
/// ```
#[derive(Debug)]
pub struct EscrowSession {
    config: EscrowConfig,
    registry: KeyRegistry,
    reference: Arc<dyn ReferenceStore>,
    secret: Option<Secret>,
}

impl EscrowSession {
    pub fn new(
        config: EscrowConfig,
        registry: KeyRegistry,
        reference: Arc<dyn ReferenceStore>,
    ) -> Self {
        Self {
            config,
            registry,
            reference,
            secret: None,
        }
    }

    /// Escrow a fixed secret instead of a random one
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub async fn run(self) -> Result<SessionReport, SessionError> {
        self.config.validate()?;
        let id = Uuid::new_v4();
        let span = tracing::info_span!("session", %id);
        self.run_inner(id).instrument(span).await
    }

    async fn run_inner(self, id: Uuid) -> Result<SessionReport, SessionError> {
        let config = self.config;
        let n = config.agents as u8;
        tracing::info!(
            "starting escrow session with {} agents, threshold {}",
            n,
            config.threshold
        );

        let (handles, inboxes): (Vec<AgentHandle>, Vec<_>) = (1..=n).map(AgentHandle::new).unzip();
        let (authority_handle, authority_inbox) = AuthorityHandle::new();
        let (completion, completion_inbox) = channel();

        // build every actor before spawning any, so bad key material fails
        // the session without leaving tasks behind
        let mut depositor = Depositor::new(
            config.clone(),
            &self.registry,
            handles.clone(),
            self.reference.clone(),
            completion,
        )?;
        if let Some(secret) = self.secret {
            depositor = depositor.with_secret(secret);
        }

        let agents = handles
            .iter()
            .zip(inboxes)
            .map(|(handle, inbox)| {
                EscrowAgent::new(
                    handle.index(),
                    &self.registry,
                    inbox,
                    authority_handle.clone(),
                    config.receive_timeout,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let authority = RecoveryAuthority::new(
            config.clone(),
            &self.registry,
            handles,
            completion_inbox,
            authority_inbox,
            self.reference,
        )?;

        // only agents may hold the release channel, so the authority sees it
        // close once every agent is done
        drop(authority_handle);

        let agent_tasks: Vec<_> = agents
            .into_iter()
            .map(|agent| {
                let index = agent.index();
                let span = tracing::info_span!("agent", index);
                (index, tokio::spawn(agent.run().instrument(span)))
            })
            .collect();
        let authority_task =
            tokio::spawn(authority.run().instrument(tracing::info_span!("authority")));
        let depositor_task =
            tokio::spawn(depositor.run().instrument(tracing::info_span!("depositor")));

        let deposited = depositor_task.await?;
        let recovered = authority_task.await?;
        let (indices, tasks): (Vec<u8>, Vec<_>) = agent_tasks.into_iter().unzip();

        let mut agents = BTreeMap::new();
        for (index, result) in indices.into_iter().zip(join_all(tasks).await) {
            let state = match result? {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("agent {} ended with error: {}", index, e);
                    e.state()
                }
            };
            agents.insert(index, state);
        }

        let delivered = deposited?;
        let outcome = match recovered {
            Ok(outcome) => outcome,
            Err(AuthorityError::Timeout {
                collected,
                threshold,
            }) => RecoveryOutcome::Unavailable {
                collected,
                threshold,
            },
            Err(AuthorityError::ChannelClosed { collected }) => RecoveryOutcome::Unavailable {
                collected,
                threshold: config.threshold,
            },
            Err(e) => {
                tracing::error!("recovery failed: {}", e);
                return Err(e.into());
            }
        };
        tracing::info!("escrow session finished: {}", outcome);

        Ok(SessionReport {
            id,
            outcome,
            agents,
            delivered,
        })
    }
}
