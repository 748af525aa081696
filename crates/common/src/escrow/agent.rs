use std::fmt;
use std::time::Duration;

use crate::crypto::{Envelope, EnvelopeError, PublicKey, SecretKey};
use crate::keystore::{KeyRegistry, ProvisioningError, Role};

use super::messages::{AgentMessage, AuthorityHandle, ChannelError, Inbox};
use super::vault::{Vault, VaultError};

/// Lifecycle of an escrow agent
///
/// `Released`, `Failed` and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    Idle,
    AwaitingVault,
    Stored,
    AwaitingRelease,
    Released,
    Failed,
    TimedOut,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingVault => "awaiting-vault",
            Self::Stored => "stored",
            Self::AwaitingRelease => "awaiting-release",
            Self::Released => "released",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("share packet could not be opened or resealed: {0}")]
    Crypto(#[from] EnvelopeError),
    #[error("nothing received within {deadline:?} while {state}")]
    Timeout { state: AgentState, deadline: Duration },
    #[error("inbound channel closed while {state}")]
    ChannelClosed { state: AgentState },
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

impl AgentError {
    /// Terminal state an agent ends in after this error
    pub fn state(&self) -> AgentState {
        match self {
            Self::Timeout { .. } => AgentState::TimedOut,
            _ => AgentState::Failed,
        }
    }
}

/// Custodian of a single share
///
/// Holds the envelope it is given until the authority asks for it, then
/// re-seals the packet for the authority. The agent never inspects the
/// packet beyond decrypting it.
#[derive(Debug)]
pub struct EscrowAgent {
    index: u8,
    secret_key: SecretKey,
    authority_key: PublicKey,
    inbox: Inbox<AgentMessage>,
    authority: AuthorityHandle,
    receive_timeout: Duration,
    vault: Vault,
    state: AgentState,
}

impl EscrowAgent {
    pub fn new(
        index: u8,
        registry: &KeyRegistry,
        inbox: Inbox<AgentMessage>,
        authority: AuthorityHandle,
        receive_timeout: Duration,
    ) -> Result<Self, ProvisioningError> {
        Ok(Self {
            index,
            secret_key: registry.secret_key(Role::Agent(index))?,
            authority_key: registry.public_key(Role::Authority)?,
            inbox,
            authority,
            receive_timeout,
            vault: Vault::new(),
            state: AgentState::Idle,
        })
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Drive the agent to a terminal state
    pub async fn run(mut self) -> Result<AgentState, AgentError> {
        self.state = AgentState::AwaitingVault;
        loop {
            match self.recv().await? {
                AgentMessage::Deposit(envelope) => {
                    self.vault.store(envelope)?;
                    self.state = AgentState::Stored;
                    tracing::debug!("agent {} stored its envelope", self.index);
                    break;
                }
                AgentMessage::Authorize => {
                    tracing::warn!(
                        "agent {} authorized before any deposit, ignoring",
                        self.index
                    );
                }
            }
        }

        self.state = AgentState::AwaitingRelease;
        loop {
            match self.recv().await? {
                AgentMessage::Authorize => break,
                AgentMessage::Deposit(_) => {
                    tracing::warn!(
                        "agent {} received a second deposit, discarding",
                        self.index
                    );
                }
            }
        }

        let envelope = self.vault.take()?;
        let sealed = match self.reseal(&envelope) {
            Ok(sealed) => sealed,
            Err(e) => {
                self.state = AgentState::Failed;
                tracing::error!("agent {} failed to release its share: {}", self.index, e);
                return Err(e);
            }
        };

        // the authority stops listening once it has enough shares
        if let Err(e) = self.authority.release(sealed) {
            tracing::debug!("agent {} released after collection ended: {}", self.index, e);
        }
        self.state = AgentState::Released;
        tracing::info!("agent {} released its share", self.index);

        Ok(self.state)
    }

    fn reseal(&self, envelope: &Envelope) -> Result<Envelope, AgentError> {
        let packet = envelope.open(&self.secret_key)?;
        Ok(Envelope::seal(&packet, &self.authority_key)?)
    }

    async fn recv(&self) -> Result<AgentMessage, AgentError> {
        self.inbox
            .recv_within(self.receive_timeout)
            .await
            .map_err(|e| match e {
                ChannelError::Timeout(deadline) => AgentError::Timeout {
                    state: self.state,
                    deadline,
                },
                ChannelError::Closed => AgentError::ChannelClosed { state: self.state },
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::Share;
    use crate::escrow::messages::AgentHandle;
    use crate::escrow::packet::{format_packet, parse_packet};

    const DEADLINE: Duration = Duration::from_secs(5);

    struct Harness {
        registry: KeyRegistry,
        handle: AgentHandle,
        authority: Inbox<Envelope>,
        agent: EscrowAgent,
    }

    fn harness(registry: KeyRegistry) -> Harness {
        let (handle, inbox) = AgentHandle::new(1);
        let (authority_handle, authority) = AuthorityHandle::new();
        let agent = EscrowAgent::new(1, &registry, inbox, authority_handle, DEADLINE).unwrap();
        Harness {
            registry,
            handle,
            authority,
            agent,
        }
    }

    fn sealed_share(registry: &KeyRegistry) -> (Share, Envelope) {
        let share = Share::new(1, [7; 16]);
        let key = registry.public_key(Role::Agent(1)).unwrap();
        let envelope = Envelope::seal(format_packet(&share).as_bytes(), &key).unwrap();
        (share, envelope)
    }

    #[tokio::test]
    async fn test_release_reseals_for_authority() {
        let h = harness(KeyRegistry::generate(1).unwrap());
        let (share, envelope) = sealed_share(&h.registry);
        assert_eq!(h.agent.state(), AgentState::Idle);

        h.handle.deposit(envelope.clone()).unwrap();
        h.handle.authorize().unwrap();
        assert_eq!(h.agent.run().await.unwrap(), AgentState::Released);

        let released = h.authority.recv_within(DEADLINE).await.unwrap();
        assert_ne!(released, envelope);
        let capo = h.registry.secret_key(Role::Authority).unwrap();
        assert_eq!(parse_packet(&released.open(&capo).unwrap()).unwrap(), share);
    }

    #[tokio::test]
    async fn test_protocol_violations_are_ignored() {
        let h = harness(KeyRegistry::generate(1).unwrap());
        let (_, envelope) = sealed_share(&h.registry);

        h.handle.authorize().unwrap();
        h.handle.deposit(envelope).unwrap();
        h.handle.deposit(Envelope::from(vec![0; 80])).unwrap();
        h.handle.authorize().unwrap();
        assert_eq!(h.agent.run().await.unwrap(), AgentState::Released);

        assert_eq!(h.authority.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_key_fails_without_release() {
        let mut registry = KeyRegistry::generate(1).unwrap();
        registry.replace_secret_key(Role::Agent(1), SecretKey::generate());
        let h = harness(registry);
        let (_, envelope) = sealed_share(&h.registry);

        h.handle.deposit(envelope).unwrap();
        h.handle.authorize().unwrap();
        let err = h.agent.run().await.unwrap_err();
        assert!(matches!(err, AgentError::Crypto(EnvelopeError::Decryption)));
        assert_eq!(err.state(), AgentState::Failed);
        assert!(h.authority.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_state() {
        let h = harness(KeyRegistry::generate(1).unwrap());
        let (_, envelope) = sealed_share(&h.registry);
        h.handle.deposit(envelope).unwrap();

        let err = h.agent.run().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Timeout {
                state: AgentState::AwaitingRelease,
                deadline,
            } if deadline == DEADLINE
        ));
        assert_eq!(err.state(), AgentState::TimedOut);
    }

    #[tokio::test]
    async fn test_closed_inbox() {
        let h = harness(KeyRegistry::generate(1).unwrap());
        drop(h.handle);
        let err = h.agent.run().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::ChannelClosed {
                state: AgentState::AwaitingVault
            }
        ));
    }

    #[test]
    fn test_missing_authority_key() {
        let registry = KeyRegistry::default();
        let (_, inbox) = AgentHandle::new(1);
        let (authority, _) = AuthorityHandle::new();
        assert!(EscrowAgent::new(1, &registry, inbox, authority, DEADLINE).is_err());
    }
}
