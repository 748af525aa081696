//! Role-addressed key material
//!
//! Every participant in an escrow session owns one X25519 keypair:
//! one per escrow agent, one for the recovery authority ("capo") and one for
//! the depositor. The registry maps each [`Role`] to its keys and is handed
//! to actors at construction, so no actor ever formats a file path itself.
//!
//! On disk the registry is two directories of PEM files:
//!
//! ```text
//! <public_dir>/agent_1_pub.pem   <private_dir>/agent_1_priv.pem
//! ...
//! <public_dir>/capo_pub.pem      <private_dir>/capo_priv.pem
//! <public_dir>/depositor_pub.pem <private_dir>/depositor_priv.pem
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::{KeyError, PublicKey, SecretKey, MAX_SHARES};

/// A participant in the escrow protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Escrow agent custodying the share with this index (1-based)
    Agent(u8),
    /// The recovery authority
    Authority,
    /// The party depositing the secret
    Depositor,
}

impl Role {
    /// Stable name used to address the role's key material
    pub fn name(&self) -> String {
        match self {
            Role::Agent(index) => format!("agent_{}", index),
            Role::Authority => "capo".to_string(),
            Role::Depositor => "depositor".to_string(),
        }
    }

    pub fn public_file_name(&self) -> String {
        format!("{}_pub.pem", self.name())
    }

    pub fn private_file_name(&self) -> String {
        format!("{}_priv.pem", self.name())
    }

    /// Every role taking part in a session with `agents` escrow agents
    pub fn all(agents: u8) -> impl Iterator<Item = Role> {
        (1..=agents)
            .map(Role::Agent)
            .chain([Role::Authority, Role::Depositor])
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("no key material registered for {0}")]
    MissingKey(Role),
    #[error("agent count must be between 1 and 255, got {0}")]
    InvalidAgentCount(usize),
    #[error("failed to access key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed key file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: KeyError,
    },
    #[error("private key for {0} does not match its public key")]
    KeyMismatch(Role),
}

/// Mapping from role to keypair
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    agents: u8,
    public_keys: HashMap<Role, PublicKey>,
    secret_keys: HashMap<Role, SecretKey>,
}

impl KeyRegistry {
    /// Generate fresh keys for `agents` escrow agents, the authority and the depositor
    pub fn generate(agents: usize) -> Result<Self, ProvisioningError> {
        let agents = checked_agent_count(agents)?;
        let mut registry = Self {
            agents,
            ..Default::default()
        };
        for role in Role::all(agents) {
            registry.insert(role, SecretKey::generate());
        }
        tracing::debug!(agents, "generated {} keypairs", registry.public_keys.len());
        Ok(registry)
    }

    /// Generate fresh keys and write them out as PEM files
    pub fn provision(
        agents: usize,
        public_dir: &Path,
        private_dir: &Path,
    ) -> Result<Self, ProvisioningError> {
        let registry = Self::generate(agents)?;
        registry.save(public_dir, private_dir)?;
        tracing::info!(
            public_dir = %public_dir.display(),
            private_dir = %private_dir.display(),
            "provisioned {} keypairs",
            registry.public_keys.len()
        );
        Ok(registry)
    }

    /// Write every keypair in the registry to the two key directories
    pub fn save(&self, public_dir: &Path, private_dir: &Path) -> Result<(), ProvisioningError> {
        for dir in [public_dir, private_dir] {
            fs::create_dir_all(dir).map_err(|source| ProvisioningError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        for role in Role::all(self.agents) {
            let public_path = public_dir.join(role.public_file_name());
            write_file(&public_path, self.public_key(role)?.to_pem())?;
            let private_path = private_dir.join(role.private_file_name());
            write_file(&private_path, self.secret_key(role)?.to_pem())?;
        }
        Ok(())
    }

    /// Load keys for `agents` escrow agents, the authority and the depositor
    ///
    /// # Errors
    ///
    /// Any missing, unreadable or malformed file is a [`ProvisioningError`].
    pub fn load(
        agents: usize,
        public_dir: &Path,
        private_dir: &Path,
    ) -> Result<Self, ProvisioningError> {
        let agents = checked_agent_count(agents)?;
        let mut registry = Self {
            agents,
            ..Default::default()
        };
        for role in Role::all(agents) {
            let public_path = public_dir.join(role.public_file_name());
            let public = PublicKey::from_pem(&read_file(&public_path)?).map_err(|source| {
                ProvisioningError::Malformed {
                    path: public_path.clone(),
                    source,
                }
            })?;

            let private_path = private_dir.join(role.private_file_name());
            let secret = SecretKey::from_pem(&read_file(&private_path)?).map_err(|source| {
                ProvisioningError::Malformed {
                    path: private_path.clone(),
                    source,
                }
            })?;

            if secret.public() != public {
                return Err(ProvisioningError::KeyMismatch(role));
            }
            registry.insert(role, secret);
        }
        tracing::debug!(agents, "loaded {} keypairs", registry.public_keys.len());
        Ok(registry)
    }

    /// Register (or replace) the keypair of a role
    pub fn insert(&mut self, role: Role, secret: SecretKey) {
        if let Role::Agent(index) = role {
            self.agents = self.agents.max(index);
        }
        self.public_keys.insert(role, secret.public());
        self.secret_keys.insert(role, secret);
    }

    /// Replace only the private half of a role's keys, leaving the published
    /// public key in place
    pub fn replace_secret_key(&mut self, role: Role, secret: SecretKey) {
        self.secret_keys.insert(role, secret);
    }

    /// Number of escrow agents the registry was provisioned for
    pub fn agents(&self) -> u8 {
        self.agents
    }

    pub fn public_key(&self, role: Role) -> Result<PublicKey, ProvisioningError> {
        self.public_keys
            .get(&role)
            .copied()
            .ok_or(ProvisioningError::MissingKey(role))
    }

    pub fn secret_key(&self, role: Role) -> Result<SecretKey, ProvisioningError> {
        self.secret_keys
            .get(&role)
            .cloned()
            .ok_or(ProvisioningError::MissingKey(role))
    }

    /// Public keys of agents `1..=agents`, ordered by index
    pub fn agent_public_keys(&self, agents: u8) -> Result<BTreeMap<u8, PublicKey>, ProvisioningError> {
        (1..=agents)
            .map(|index| Ok((index, self.public_key(Role::Agent(index))?)))
            .collect()
    }

    /// Whether both key directories already hold the authority's keys
    pub fn exists(public_dir: &Path, private_dir: &Path) -> bool {
        public_dir.join(Role::Authority.public_file_name()).exists()
            && private_dir.join(Role::Authority.private_file_name()).exists()
    }
}

fn checked_agent_count(agents: usize) -> Result<u8, ProvisioningError> {
    if agents == 0 || agents > MAX_SHARES {
        return Err(ProvisioningError::InvalidAgentCount(agents));
    }
    Ok(agents as u8)
}

fn read_file(path: &Path) -> Result<String, ProvisioningError> {
    fs::read_to_string(path).map_err(|source| ProvisioningError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: String) -> Result<(), ProvisioningError> {
    fs::write(path, contents).map_err(|source| ProvisioningError::Io {
        path: path.to_path_buf(),
        source,
    })
}
