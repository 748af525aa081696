use std::collections::BTreeMap;
use std::sync::Arc;

use crate::crypto::{split, Envelope, EnvelopeError, PublicKey, Secret, ShamirError};
use crate::keystore::{KeyRegistry, ProvisioningError, Role};
use crate::reference::ReferenceStore;

use super::config::{ConfigError, EscrowConfig};
use super::messages::{AgentHandle, DepositNotice};
use super::packet::format_packet;

#[derive(Debug, thiserror::Error)]
pub enum DepositorError {
    #[error("invalid escrow parameters: {0}")]
    InvalidParameters(#[from] ConfigError),
    #[error("key material unavailable: {0}")]
    Provisioning(#[from] ProvisioningError),
    #[error("failed to split secret: {0}")]
    Sharing(#[from] ShamirError),
    #[error("failed to seal share packet: {0}")]
    Crypto(#[from] EnvelopeError),
}

/// Generates the escrowed secret and hands one sealed share to every agent
#[derive(Debug)]
pub struct Depositor {
    config: EscrowConfig,
    recipients: BTreeMap<u8, PublicKey>,
    agents: BTreeMap<u8, AgentHandle>,
    reference: Arc<dyn ReferenceStore>,
    completion: flume::Sender<DepositNotice>,
    secret: Option<Secret>,
}

impl Depositor {
    /// Resolve every agent's public key up front, so a missing key fails
    /// before any share leaves the depositor
    pub fn new(
        config: EscrowConfig,
        registry: &KeyRegistry,
        agents: Vec<AgentHandle>,
        reference: Arc<dyn ReferenceStore>,
        completion: flume::Sender<DepositNotice>,
    ) -> Result<Self, DepositorError> {
        config.validate()?;
        let recipients = registry.agent_public_keys(config.agents as u8)?;
        let agents = agents
            .into_iter()
            .map(|handle| (handle.index(), handle))
            .collect();

        Ok(Self {
            config,
            recipients,
            agents,
            reference,
            completion,
            secret: None,
        })
    }

    /// Escrow a known secret instead of a freshly generated one
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Run the deposit phase, returning how many agents were reached
    pub async fn run(self) -> Result<usize, DepositorError> {
        let secret = self.secret.clone().unwrap_or_else(Secret::generate);

        // the authority only reads the reference after the completion
        // notice, so this write is ordered before it
        if let Err(e) = self.reference.write(&secret).await {
            tracing::warn!("failed to write reference copy: {}", e);
        }

        let shares = split(secret.bytes(), self.config.threshold, self.config.agents)?;
        tracing::info!(
            "split secret into {} shares, threshold {}",
            shares.len(),
            self.config.threshold
        );

        let mut delivered = 0;
        for share in shares {
            let index = share.index();
            let Some(recipient) = self.recipients.get(&index) else {
                tracing::warn!("no public key for agent {}, skipping", index);
                continue;
            };
            let Some(handle) = self.agents.get(&index) else {
                tracing::warn!("no channel to agent {}, skipping", index);
                continue;
            };

            let envelope = Envelope::seal(format_packet(&share).as_bytes(), recipient)?;
            tracing::debug!("sealed packet for agent {} ({} bytes)", index, envelope.len());

            match handle.deposit(envelope) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("could not deposit with agent {}: {}", index, e),
            }
        }

        if self
            .completion
            .send(DepositNotice::Completed { delivered })
            .is_err()
        {
            tracing::warn!("authority is gone, deposit completion went unheard");
        }
        tracing::info!("deposit complete, {} of {} agents reached", delivered, self.config.agents);

        Ok(delivered)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::crypto::combine;
    use crate::escrow::messages::{channel, AgentMessage, Inbox};
    use crate::escrow::packet::parse_packet;
    use crate::reference::MemoryReferenceStore;

    const DEADLINE: Duration = Duration::from_secs(1);

    fn agents(n: u8) -> (Vec<AgentHandle>, Vec<Inbox<AgentMessage>>) {
        (1..=n).map(AgentHandle::new).unzip()
    }

    #[tokio::test]
    async fn test_deposits_one_share_per_agent() {
        let registry = KeyRegistry::generate(5).unwrap();
        let reference = MemoryReferenceStore::new();
        let (handles, inboxes) = agents(5);
        let (completion, notices) = channel();
        let secret = Secret::from([0x42; 16]);

        let depositor = Depositor::new(
            EscrowConfig::new(5, 3),
            &registry,
            handles,
            Arc::new(reference.clone()),
            completion,
        )
        .unwrap()
        .with_secret(secret.clone());

        assert_eq!(depositor.run().await.unwrap(), 5);
        assert_eq!(
            notices.recv_within(DEADLINE).await.unwrap(),
            DepositNotice::Completed { delivered: 5 }
        );
        assert_eq!(reference.get(), Some(secret.clone()));

        let mut shares = Vec::new();
        for (i, inbox) in inboxes.iter().enumerate() {
            let index = i as u8 + 1;
            let AgentMessage::Deposit(envelope) = inbox.recv_within(DEADLINE).await.unwrap() else {
                panic!("expected a deposit");
            };
            let key = registry.secret_key(Role::Agent(index)).unwrap();
            let share = parse_packet(&envelope.open(&key).unwrap()).unwrap();
            assert_eq!(share.index(), index);
            shares.push(share);
            assert!(inbox.is_empty());
        }
        assert_eq!(combine(&shares[1..4]).unwrap(), secret);
    }

    #[tokio::test]
    async fn test_closed_agent_is_skipped() {
        let registry = KeyRegistry::generate(3).unwrap();
        let (handles, mut inboxes) = agents(3);
        let (completion, notices) = channel();
        drop(inboxes.remove(1));

        let depositor = Depositor::new(
            EscrowConfig::new(3, 2),
            &registry,
            handles,
            Arc::new(MemoryReferenceStore::new()),
            completion,
        )
        .unwrap();

        assert_eq!(depositor.run().await.unwrap(), 2);
        assert_eq!(
            notices.recv_within(DEADLINE).await.unwrap(),
            DepositNotice::Completed { delivered: 2 }
        );
    }

    #[test]
    fn test_missing_agent_key() {
        let registry = KeyRegistry::generate(3).unwrap();
        let (handles, _inboxes) = agents(4);
        let (completion, _notices) = channel();

        let result = Depositor::new(
            EscrowConfig::new(4, 2),
            &registry,
            handles,
            Arc::new(MemoryReferenceStore::new()),
            completion,
        );
        assert!(matches!(
            result,
            Err(DepositorError::Provisioning(ProvisioningError::MissingKey(
                Role::Agent(4)
            )))
        ));
    }
}
