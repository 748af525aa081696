use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tempfile::TempDir;

use crate::crypto::{Secret, SecretKey};
use crate::escrow::{EscrowConfig, EscrowSession, SessionReport};
use crate::keystore::{KeyRegistry, Role};
use crate::reference::{MemoryReferenceStore, ReferenceStore};

/// Short enough that a stalled session fails a test quickly
const TEST_RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

/// A single escrow round with test-friendly defaults
pub struct TestEscrow {
    config: EscrowConfig,
    registry: KeyRegistry,
    reference: Arc<dyn ReferenceStore>,
    memory: MemoryReferenceStore,
    secret: Option<Secret>,
    /// Keeps provisioned key files alive for the life of the harness
    key_dir: Option<TempDir>,
}

impl TestEscrow {
    /// Generate keys for `agents` agents and prepare a `threshold`-of-`agents` round
    pub fn new(agents: usize, threshold: usize) -> Result<Self> {
        let registry = KeyRegistry::generate(agents)?;
        let memory = MemoryReferenceStore::new();
        Ok(Self {
            config: EscrowConfig::new(agents, threshold).with_receive_timeout(TEST_RECEIVE_TIMEOUT),
            registry,
            reference: Arc::new(memory.clone()),
            memory,
            secret: None,
            key_dir: None,
        })
    }

    /// Like [`TestEscrow::new`], but the keys make a round trip through PEM
    /// files in a temporary directory first
    pub fn provisioned(agents: usize, threshold: usize) -> Result<Self> {
        let key_dir = tempfile::tempdir()?;
        let (public_dir, private_dir) = key_dirs(key_dir.path());
        KeyRegistry::provision(agents, &public_dir, &private_dir)?;
        let registry = KeyRegistry::load(agents, &public_dir, &private_dir)?;

        let mut escrow = Self::new(agents, threshold)?;
        escrow.registry = registry;
        escrow.key_dir = Some(key_dir);
        Ok(escrow)
    }

    /// Escrow a fixed secret
    pub fn with_secret(mut self, secret: impl Into<Secret>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_receive_timeout(timeout);
        self
    }

    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.with_release_delay(delay);
        self
    }

    /// Swap the reference store, e.g. for a file-backed one
    pub fn with_reference(mut self, reference: impl ReferenceStore) -> Self {
        self.reference = Arc::new(reference);
        self
    }

    /// Give agent `index` a private key that does not match its published
    /// public key, so it fails to open its deposit
    pub fn sabotage(mut self, index: u8) -> Result<Self> {
        if index == 0 || index as usize > self.config.agents {
            return Err(anyhow!("no agent {} to sabotage", index));
        }
        self.registry
            .replace_secret_key(Role::Agent(index), SecretKey::generate());
        Ok(self)
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// The in-memory reference copy, unless replaced with [`TestEscrow::with_reference`]
    pub fn reference(&self) -> &MemoryReferenceStore {
        &self.memory
    }

    /// Public and private key directories, if the keys were provisioned to disk
    pub fn key_dirs(&self) -> Option<(PathBuf, PathBuf)> {
        self.key_dir.as_ref().map(|dir| key_dirs(dir.path()))
    }

    /// Run the round to completion
    pub async fn run(self) -> Result<SessionReport> {
        let mut session = EscrowSession::new(self.config, self.registry, self.reference);
        if let Some(secret) = self.secret {
            session = session.with_secret(secret);
        }
        Ok(session.run().await?)
    }
}

fn key_dirs(root: &Path) -> (PathBuf, PathBuf) {
    (root.join("public"), root.join("private"))
}
